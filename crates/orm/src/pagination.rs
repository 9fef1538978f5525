//! Length-aware pagination
//!
//! A [`Paginator`] holds one page of items plus the total row count from a
//! separate COUNT query, and serializes to the conventional JSON shape
//! (`current_page`, `data`, `links`, `total`, ...).

use serde::{Serialize, Serializer};

/// Pages shown on each side of the current page in `links`
const ON_EACH_SIDE: u64 = 3;

/// One entry of the `links` array
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PageLink {
    pub url: Option<String>,
    pub label: String,
    pub active: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Paginator<T> {
    items: Vec<T>,
    total: u64,
    per_page: u64,
    current_page: u64,
    path: String,
}

impl<T> Paginator<T> {
    /// `page` is 1-based; 0 is treated as 1
    pub fn new(items: Vec<T>, total: u64, per_page: u64, page: u64) -> Self {
        Self {
            items,
            total,
            per_page: per_page.max(1),
            current_page: page.max(1),
            path: "/".to_string(),
        }
    }

    /// Base URL used for the page links
    pub fn with_path(mut self, path: impl Into<String>) -> Self {
        self.path = path.into();
        self
    }

    pub fn items(&self) -> &[T] {
        &self.items
    }

    pub fn into_items(self) -> Vec<T> {
        self.items
    }

    pub fn total(&self) -> u64 {
        self.total
    }

    pub fn per_page(&self) -> u64 {
        self.per_page
    }

    pub fn current_page(&self) -> u64 {
        self.current_page
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    /// `max(1, ceil(total / per_page))`
    pub fn last_page(&self) -> u64 {
        self.total.div_ceil(self.per_page).max(1)
    }

    /// 1-based position of the first item on this page
    pub fn from(&self) -> Option<u64> {
        (!self.items.is_empty()).then(|| {
            (self.current_page - 1)
                .saturating_mul(self.per_page)
                .saturating_add(1)
        })
    }

    /// 1-based position of the last item on this page
    pub fn to(&self) -> Option<u64> {
        self.from().map(|from| from.saturating_add(self.items.len() as u64 - 1))
    }

    pub fn has_pages(&self) -> bool {
        self.current_page != 1 || self.has_more_pages()
    }

    pub fn has_more_pages(&self) -> bool {
        self.current_page < self.last_page()
    }

    pub fn on_first_page(&self) -> bool {
        self.current_page <= 1
    }

    pub fn on_last_page(&self) -> bool {
        !self.has_more_pages()
    }

    pub fn url(&self, page: u64) -> String {
        let separator = if self.path.contains('?') { '&' } else { '?' };
        format!("{}{}page={}", self.path, separator, page.max(1))
    }

    pub fn first_page_url(&self) -> String {
        self.url(1)
    }

    pub fn last_page_url(&self) -> String {
        self.url(self.last_page())
    }

    pub fn next_page_url(&self) -> Option<String> {
        self.has_more_pages().then(|| self.url(self.current_page + 1))
    }

    pub fn previous_page_url(&self) -> Option<String> {
        (self.current_page > 1).then(|| self.url(self.current_page - 1))
    }

    /// Previous link, a window of page links with `...` gaps, next link
    pub fn links(&self) -> Vec<PageLink> {
        let mut links = vec![PageLink {
            url: self.previous_page_url(),
            label: "&laquo; Previous".to_string(),
            active: false,
        }];

        for (i, range) in self.window().into_iter().enumerate() {
            if i > 0 {
                links.push(PageLink {
                    url: None,
                    label: "...".to_string(),
                    active: false,
                });
            }
            links.extend(range.map(|page| PageLink {
                url: Some(self.url(page)),
                label: page.to_string(),
                active: page == self.current_page,
            }));
        }

        links.push(PageLink {
            url: self.next_page_url(),
            label: "Next &raquo;".to_string(),
            active: false,
        });
        links
    }

    fn window(&self) -> Vec<std::ops::RangeInclusive<u64>> {
        let last = self.last_page();
        let current = self.current_page;
        if last < ON_EACH_SIDE * 2 + 8 {
            return vec![1..=last];
        }

        let window = ON_EACH_SIDE + 4;
        if current <= window {
            vec![1..=window + ON_EACH_SIDE, last - 1..=last]
        } else if current > last - window {
            vec![1..=2, last - (window + ON_EACH_SIDE - 1)..=last]
        } else {
            vec![1..=2, current - ON_EACH_SIDE..=current + ON_EACH_SIDE, last - 1..=last]
        }
    }

    pub fn map<U, F>(self, f: F) -> Paginator<U>
    where
        F: FnMut(T) -> U,
    {
        Paginator {
            items: self.items.into_iter().map(f).collect(),
            total: self.total,
            per_page: self.per_page,
            current_page: self.current_page,
            path: self.path,
        }
    }
}

#[derive(Serialize)]
struct PaginatorJson<'a, T> {
    current_page: u64,
    data: &'a [T],
    first_page_url: String,
    from: Option<u64>,
    last_page: u64,
    last_page_url: String,
    links: Vec<PageLink>,
    next_page_url: Option<String>,
    path: &'a str,
    per_page: u64,
    prev_page_url: Option<String>,
    to: Option<u64>,
    total: u64,
}

impl<T: Serialize> Serialize for Paginator<T> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        PaginatorJson {
            current_page: self.current_page,
            data: &self.items,
            first_page_url: self.first_page_url(),
            from: self.from(),
            last_page: self.last_page(),
            last_page_url: self.last_page_url(),
            links: self.links(),
            next_page_url: self.next_page_url(),
            path: &self.path,
            per_page: self.per_page,
            prev_page_url: self.previous_page_url(),
            to: self.to(),
            total: self.total,
        }
        .serialize(serializer)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn page(total: u64, per_page: u64, page: u64) -> Paginator<u64> {
        let start = (page.max(1) - 1) * per_page;
        let items: Vec<u64> = (start + 1..=total.min(start + per_page)).collect();
        Paginator::new(items, total, per_page, page)
    }

    #[test]
    fn test_page_math_for_95_rows() {
        let first = page(95, 20, 1);
        assert_eq!(first.last_page(), 5);
        assert_eq!(first.items().len(), 20);
        assert_eq!((first.from(), first.to()), (Some(1), Some(20)));

        let last = page(95, 20, 5);
        assert_eq!(last.items().len(), 15);
        assert_eq!((last.from(), last.to()), (Some(81), Some(95)));
        assert!(last.on_last_page());
        assert!(last.next_page_url().is_none());

        let beyond = page(95, 20, 6);
        assert!(beyond.items().is_empty());
        assert_eq!(beyond.from(), None);
    }

    #[test]
    fn test_huge_page_number_does_not_overflow() {
        let far = Paginator::new(vec![1u64], 95, 20, u64::MAX);
        assert_eq!((far.from(), far.to()), (Some(u64::MAX), Some(u64::MAX)));
        assert!(far.next_page_url().is_none());
        assert!(!far.links().is_empty());
    }

    #[test]
    fn test_empty_result_has_one_page() {
        let empty: Paginator<u64> = Paginator::new(Vec::new(), 0, 15, 1);
        assert_eq!(empty.last_page(), 1);
        assert!(!empty.has_pages());
    }

    #[test]
    fn test_json_shape() {
        let json = serde_json::to_value(page(95, 20, 2).with_path("/products")).unwrap();
        assert_eq!(json["current_page"], 2);
        assert_eq!(json["data"].as_array().unwrap().len(), 20);
        assert_eq!(json["first_page_url"], "/products?page=1");
        assert_eq!(json["prev_page_url"], "/products?page=1");
        assert_eq!(json["next_page_url"], "/products?page=3");
        assert_eq!(json["last_page"], 5);
        assert_eq!(json["from"], 21);
        assert_eq!(json["to"], 40);
        assert_eq!(json["total"], 95);

        let links = json["links"].as_array().unwrap();
        assert_eq!(links.len(), 7);
        assert_eq!(links[0]["label"], "&laquo; Previous");
        assert_eq!(links[2]["active"], true);
        assert_eq!(links[6]["label"], "Next &raquo;");
    }

    #[test]
    fn test_link_window_with_many_pages() {
        let paginator: Paginator<u64> = Paginator::new(Vec::new(), 1000, 10, 50);
        let labels: Vec<String> = paginator.links().into_iter().map(|l| l.label).collect();
        assert_eq!(
            labels,
            vec![
                "&laquo; Previous", "1", "2", "...", "47", "48", "49", "50", "51", "52", "53", "...", "99", "100",
                "Next &raquo;"
            ]
        );
    }
}
