//! File search filters.
//!
//! Query parameters are parsed into a [`FileQuery`] and validated up front. The query is
//! then either lowered into a MongoDB filter ([`FileQuery::to_filter`]) or evaluated
//! directly against records ([`FileQuery::matches`]); both paths share the same
//! semantics.

use chrono::{DateTime, Duration, Months, TimeZone, Utc};
use mongodb::bson::{doc, Bson, Document};
use serde::Serialize;
use service_core::error::AppError;
use std::cmp::Ordering;
use std::str::FromStr;

use crate::dtos::SearchParams;
use crate::models::FileRecord;

pub const DEFAULT_PAGE_SIZE: u64 = 20;
pub const MAX_PAGE_SIZE: u64 = 100;

const MIB: i64 = 1024 * 1024;

/// Validate `page`/`limit` and return the number of records to skip.
///
/// `page` is 1-based and `limit` must be in `1..=MAX_PAGE_SIZE`. The offset has to fit
/// the signed 64-bit skip the database accepts.
pub fn page_offset(page: u64, limit: u64) -> Result<u64, AppError> {
    if page == 0 {
        return Err(AppError::BadRequest(anyhow::anyhow!("page must be >= 1")));
    }
    if limit == 0 || limit > MAX_PAGE_SIZE {
        return Err(AppError::BadRequest(anyhow::anyhow!(
            "limit must be between 1 and {}",
            MAX_PAGE_SIZE
        )));
    }
    (page - 1)
        .checked_mul(limit)
        .filter(|offset| i64::try_from(*offset).is_ok())
        .ok_or_else(|| AppError::BadRequest(anyhow::anyhow!("page is out of range")))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DateRange {
    Today,
    Week,
    Month,
    Year,
}

impl DateRange {
    pub const ALL: [DateRange; 4] = [
        DateRange::Today,
        DateRange::Week,
        DateRange::Month,
        DateRange::Year,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            DateRange::Today => "today",
            DateRange::Week => "week",
            DateRange::Month => "month",
            DateRange::Year => "year",
        }
    }

    /// Lower bound of the window ending at `now`.
    pub fn start(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        match self {
            DateRange::Today => Utc
                .from_utc_datetime(&now.date_naive().and_hms_opt(0, 0, 0).unwrap_or_default()),
            DateRange::Week => now - Duration::days(7),
            DateRange::Month => now.checked_sub_months(Months::new(1)).unwrap_or(now),
            DateRange::Year => now.checked_sub_months(Months::new(12)).unwrap_or(now),
        }
    }
}

impl FromStr for DateRange {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        DateRange::ALL
            .into_iter()
            .find(|r| r.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| AppError::BadRequest(anyhow::anyhow!("Unknown dateRange: {}", s)))
    }
}

/// Size buckets. Bounds are half-open: `[min, max)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SizeRange {
    Small,
    Medium,
    Large,
    XLarge,
}

impl SizeRange {
    pub const ALL: [SizeRange; 4] = [
        SizeRange::Small,
        SizeRange::Medium,
        SizeRange::Large,
        SizeRange::XLarge,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            SizeRange::Small => "small",
            SizeRange::Medium => "medium",
            SizeRange::Large => "large",
            SizeRange::XLarge => "xlarge",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            SizeRange::Small => "Small (0-1MB)",
            SizeRange::Medium => "Medium (1-10MB)",
            SizeRange::Large => "Large (10MB-100MB)",
            SizeRange::XLarge => "X-Large (>100MB)",
        }
    }

    pub fn bounds(&self) -> (i64, Option<i64>) {
        match self {
            SizeRange::Small => (0, Some(MIB)),
            SizeRange::Medium => (MIB, Some(10 * MIB)),
            SizeRange::Large => (10 * MIB, Some(100 * MIB)),
            SizeRange::XLarge => (100 * MIB, None),
        }
    }

    pub fn contains(&self, size: i64) -> bool {
        let (min, max) = self.bounds();
        size >= min && max.map_or(true, |max| size < max)
    }
}

impl FromStr for SizeRange {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        SizeRange::ALL
            .into_iter()
            .find(|r| r.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| AppError::BadRequest(anyhow::anyhow!("Unknown sizeRange: {}", s)))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortField {
    #[default]
    CreatedAt,
    UpdatedAt,
    Name,
    Size,
    DownloadCount,
}

impl SortField {
    /// Stored field name.
    pub fn field(&self) -> &'static str {
        match self {
            SortField::CreatedAt => "created_at",
            SortField::UpdatedAt => "updated_at",
            SortField::Name => "name",
            SortField::Size => "size",
            SortField::DownloadCount => "download_count",
        }
    }

    fn compare(&self, a: &FileRecord, b: &FileRecord) -> Ordering {
        match self {
            SortField::CreatedAt => a.created_at.cmp(&b.created_at),
            SortField::UpdatedAt => a.updated_at.cmp(&b.updated_at),
            SortField::Name => a.name.cmp(&b.name),
            SortField::Size => a.size.cmp(&b.size),
            SortField::DownloadCount => a.download_count.cmp(&b.download_count),
        }
    }
}

impl FromStr for SortField {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "createdAt" | "created_at" => Ok(SortField::CreatedAt),
            "updatedAt" | "updated_at" => Ok(SortField::UpdatedAt),
            "name" => Ok(SortField::Name),
            "size" => Ok(SortField::Size),
            "downloadCount" | "download_count" => Ok(SortField::DownloadCount),
            other => Err(AppError::BadRequest(anyhow::anyhow!(
                "Unknown sortBy: {}",
                other
            ))),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortOrder {
    Asc,
    #[default]
    Desc,
}

impl FromStr for SortOrder {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "asc" => Ok(SortOrder::Asc),
            "desc" => Ok(SortOrder::Desc),
            other => Err(AppError::BadRequest(anyhow::anyhow!(
                "Unknown sortOrder: {}",
                other
            ))),
        }
    }
}

/// A validated, owner-scoped file query.
#[derive(Debug, Clone, PartialEq)]
pub struct FileQuery {
    pub owner_id: String,
    /// Case-insensitive name prefix.
    pub name_prefix: Option<String>,
    /// Case-insensitive substring of the content type.
    pub content_type: Option<String>,
    pub created_from: Option<DateTime<Utc>>,
    pub created_to: Option<DateTime<Utc>>,
    pub size: Option<SizeRange>,
    pub sort: SortField,
    pub order: SortOrder,
    pub page: u64,
    pub limit: u64,
}

impl FileQuery {
    /// Every file of `owner_id`, newest first, unpaged.
    pub fn for_owner(owner_id: &str) -> Self {
        Self {
            owner_id: owner_id.to_string(),
            name_prefix: None,
            content_type: None,
            created_from: None,
            created_to: None,
            size: None,
            sort: SortField::CreatedAt,
            order: SortOrder::Desc,
            page: 1,
            limit: 0,
        }
    }

    pub fn created_between(mut self, from: DateTime<Utc>, to: Option<DateTime<Utc>>) -> Self {
        self.created_from = Some(from);
        self.created_to = to;
        self
    }

    /// Parse and validate search parameters for `owner_id`.
    pub fn from_params(
        owner_id: &str,
        params: &SearchParams,
        now: DateTime<Utc>,
    ) -> Result<Self, AppError> {
        let mut query = Self::for_owner(owner_id);

        query.name_prefix = non_empty(params.q.as_deref());
        query.content_type = non_empty(params.file_types.as_deref());

        if let Some(range) = non_empty(params.date_range.as_deref()) {
            let range: DateRange = range.parse()?;
            query.created_from = Some(range.start(now));
            query.created_to = Some(now);
        }

        if let Some(size) = non_empty(params.size_range.as_deref()) {
            query.size = Some(size.parse()?);
        }

        if let Some(sort) = non_empty(params.sort_by.as_deref()) {
            query.sort = sort.parse()?;
        }

        if let Some(order) = non_empty(params.sort_order.as_deref()) {
            query.order = order.parse()?;
        }

        let page = params.page.unwrap_or(1);
        let limit = params.limit.unwrap_or(DEFAULT_PAGE_SIZE);
        page_offset(page, limit)?;
        query.page = page;
        query.limit = limit;

        Ok(query)
    }

    /// Lower into a MongoDB filter document.
    pub fn to_filter(&self) -> Document {
        let mut filter = doc! { "owner_id": &self.owner_id };

        if let Some(prefix) = &self.name_prefix {
            filter.insert(
                "name",
                doc! { "$regex": format!("^{}", regex::escape(prefix)), "$options": "i" },
            );
        }

        if let Some(content_type) = &self.content_type {
            filter.insert(
                "content_type",
                doc! { "$regex": regex::escape(content_type), "$options": "i" },
            );
        }

        if self.created_from.is_some() || self.created_to.is_some() {
            let mut range = Document::new();
            if let Some(from) = self.created_from {
                range.insert("$gte", Bson::DateTime(from.into()));
            }
            if let Some(to) = self.created_to {
                range.insert("$lte", Bson::DateTime(to.into()));
            }
            filter.insert("created_at", range);
        }

        if let Some(size) = self.size {
            let (min, max) = size.bounds();
            let mut range = doc! { "$gte": min };
            if let Some(max) = max {
                range.insert("$lt", max);
            }
            filter.insert("size", range);
        }

        filter
    }

    pub fn sort_document(&self) -> Document {
        let direction = match self.order {
            SortOrder::Asc => 1,
            SortOrder::Desc => -1,
        };
        doc! { self.sort.field(): direction }
    }

    pub fn skip(&self) -> u64 {
        (self.page.max(1) - 1).saturating_mul(self.limit)
    }

    /// Evaluate the filter against a record.
    pub fn matches(&self, file: &FileRecord) -> bool {
        if file.owner_id != self.owner_id {
            return false;
        }
        if let Some(prefix) = &self.name_prefix {
            if !file.name.to_lowercase().starts_with(&prefix.to_lowercase()) {
                return false;
            }
        }
        if let Some(content_type) = &self.content_type {
            if !file
                .content_type
                .to_lowercase()
                .contains(&content_type.to_lowercase())
            {
                return false;
            }
        }
        if self.created_from.is_some_and(|from| file.created_at < from) {
            return false;
        }
        if self.created_to.is_some_and(|to| file.created_at > to) {
            return false;
        }
        if self.size.is_some_and(|size| !size.contains(file.size)) {
            return false;
        }
        true
    }

    /// Ordering consistent with [`FileQuery::sort_document`].
    pub fn compare(&self, a: &FileRecord, b: &FileRecord) -> Ordering {
        let ordering = self.sort.compare(a, b);
        match self.order {
            SortOrder::Asc => ordering,
            SortOrder::Desc => ordering.reverse(),
        }
    }

    /// Sort, then apply page/limit to an in-memory result set.
    pub fn apply(&self, mut files: Vec<FileRecord>) -> Vec<FileRecord> {
        files.retain(|f| self.matches(f));
        files.sort_by(|a, b| self.compare(a, b));
        let skip = self.skip() as usize;
        let files = files.into_iter().skip(skip);
        if self.limit == 0 {
            files.collect()
        } else {
            files.take(self.limit as usize).collect()
        }
    }
}

fn non_empty(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(|v| v.to_string())
}

/// One selectable size bucket in the filters listing.
#[derive(Debug, Clone, Serialize)]
pub struct SizeRangeOption {
    pub label: &'static str,
    pub value: &'static str,
    pub min: i64,
    pub max: Option<i64>,
}

pub fn size_range_options() -> Vec<SizeRangeOption> {
    SizeRange::ALL
        .iter()
        .map(|r| {
            let (min, max) = r.bounds();
            SizeRangeOption {
                label: r.label(),
                value: r.as_str(),
                min,
                max,
            }
        })
        .collect()
}
