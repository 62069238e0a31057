use crate::domain::notification::{NotificationCategory, NotificationType};

pub const DEFAULT_PAGE_LIMIT: u32 = 20;

/// Query for one page of the notification list view. Not persisted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NotificationFilter {
    pub is_read: Option<bool>,
    pub category: Option<NotificationCategory>,
    pub notification_type: Option<NotificationType>,
    pub search: Option<String>,
    pub page: u32,
    pub limit: u32,
}

impl Default for NotificationFilter {
    fn default() -> Self {
        Self {
            is_read: None,
            category: None,
            notification_type: None,
            search: None,
            page: 1,
            limit: DEFAULT_PAGE_LIMIT,
        }
    }
}

impl NotificationFilter {
    pub fn unread() -> Self {
        Self {
            is_read: Some(false),
            ..Default::default()
        }
    }

    pub fn with_limit(mut self, limit: u32) -> Self {
        self.limit = limit;
        self
    }

    pub fn with_page(mut self, page: u32) -> Self {
        self.page = page.max(1);
        self
    }

    pub fn query_pairs(&self) -> Vec<(&'static str, String)> {
        let mut pairs = vec![("page", self.page.to_string()), ("limit", self.limit.to_string())];

        if let Some(is_read) = self.is_read {
            pairs.push(("isRead", is_read.to_string()));
        }
        if let Some(category) = self.category {
            pairs.push(("category", category.to_string()));
        }
        if let Some(notification_type) = self.notification_type {
            pairs.push(("type", notification_type.to_string()));
        }
        if let Some(search) = self.search.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
            pairs.push(("search", search.to_string()));
        }

        pairs
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_query_has_only_paging() {
        let pairs = NotificationFilter::default().query_pairs();

        assert_eq!(pairs, vec![("page", "1".to_string()), ("limit", "20".to_string())]);
    }

    #[test]
    fn test_query_includes_set_filters() {
        let filter = NotificationFilter {
            is_read: Some(false),
            category: Some(NotificationCategory::Ledger),
            notification_type: Some(NotificationType::Error),
            search: Some("  invoice ".to_string()),
            page: 3,
            limit: 50,
        };

        let pairs = filter.query_pairs();

        assert!(pairs.contains(&("isRead", "false".to_string())));
        assert!(pairs.contains(&("category", "ledger".to_string())));
        assert!(pairs.contains(&("type", "error".to_string())));
        assert!(pairs.contains(&("search", "invoice".to_string())));
        assert!(pairs.contains(&("page", "3".to_string())));
    }

    #[test]
    fn test_blank_search_is_omitted() {
        let filter = NotificationFilter {
            search: Some("   ".to_string()),
            ..Default::default()
        };

        assert!(filter.query_pairs().iter().all(|(k, _)| *k != "search"));
    }

    #[test]
    fn test_page_is_at_least_one() {
        assert_eq!(NotificationFilter::default().with_page(0).page, 1);
    }
}
