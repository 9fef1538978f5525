//! Query Builder pagination operations

use super::builder::QueryBuilder;
use crate::error::OrmResult;
use crate::pagination::Paginator;
use crate::result::Row;

impl QueryBuilder {
    /// Add LIMIT clause
    pub fn limit(mut self, count: u64) -> Self {
        self.limit = Some(count);
        self
    }

    /// Add OFFSET clause
    pub fn offset(mut self, count: u64) -> Self {
        self.offset = Some(count);
        self
    }

    pub fn take(self, count: u64) -> Self {
        self.limit(count)
    }

    pub fn skip(self, count: u64) -> Self {
        self.offset(count)
    }

    /// LIMIT/OFFSET for a 1-based page; page 0 is treated as page 1
    pub fn for_page(self, page: u64, per_page: u64) -> Self {
        let page = page.max(1);
        self.offset((page - 1).saturating_mul(per_page)).limit(per_page)
    }

    /// Count all matching rows, then fetch one page of them
    pub async fn paginate(&self, per_page: u64, page: u64) -> OrmResult<Paginator<Row>> {
        let per_page = per_page.max(1);
        let total = self.clone().reorder().count("*").await?;
        let rows = self.clone().for_page(page, per_page).get().await?;
        Ok(Paginator::new(rows.into_rows(), total as u64, per_page, page))
    }
}
