use std::{cmp::Ordering, fmt, str::FromStr};

use chrono::{DateTime, Utc};
use shared::domain::{Customer, Kra, RecordId, Selectable, Task, Team, Ticket, User};

pub const FIRST_PAGE: usize = 1;

/// A record that can be searched, status-filtered and sorted in a list screen.
pub trait Listable: Selectable {
    /// Fields matched by the free-text search.
    fn search_fields(&self) -> Vec<&str>;
    /// Key compared against an exact status filter.
    fn status_key(&self) -> &str;
    /// Value of a sortable field; unknown fields are [`SortValue::Missing`].
    fn sort_value(&self, field: &str) -> SortValue;
}

#[derive(Debug, Clone, PartialEq)]
pub enum SortValue {
    Text(String),
    Number(f64),
    Time(DateTime<Utc>),
    Missing,
}

impl SortValue {
    /// Text compared case-insensitively.
    pub fn text(value: &str) -> Self {
        SortValue::Text(value.to_lowercase())
    }

    pub fn optional_text(value: Option<&RecordId>) -> Self {
        value.map_or(SortValue::Missing, |id| SortValue::text(id.as_str()))
    }

    pub fn optional_time(value: Option<DateTime<Utc>>) -> Self {
        value.map_or(SortValue::Missing, SortValue::Time)
    }

    fn rank(&self) -> u8 {
        match self {
            SortValue::Number(_) => 0,
            SortValue::Time(_) => 1,
            SortValue::Text(_) => 2,
            SortValue::Missing => 3,
        }
    }

    /// Ascending order; missing values sort last.
    pub fn compare(&self, other: &Self) -> Ordering {
        match (self, other) {
            (SortValue::Text(a), SortValue::Text(b)) => a.cmp(b),
            (SortValue::Number(a), SortValue::Number(b)) => a.total_cmp(b),
            (SortValue::Time(a), SortValue::Time(b)) => a.cmp(b),
            _ => self.rank().cmp(&other.rank()),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SortOrder {
    #[default]
    Asc,
    Desc,
}

impl SortOrder {
    pub fn apply(self, ordering: Ordering) -> Ordering {
        match self {
            SortOrder::Asc => ordering,
            SortOrder::Desc => ordering.reverse(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum StatusFilter {
    #[default]
    All,
    Is(String),
}

impl StatusFilter {
    pub fn matches(&self, status: &str) -> bool {
        match self {
            StatusFilter::All => true,
            StatusFilter::Is(expected) => expected == status,
        }
    }
}

impl FromStr for StatusFilter {
    type Err = std::convert::Infallible;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        Ok(match value {
            "" | "all" => StatusFilter::All,
            other => StatusFilter::Is(other.to_string()),
        })
    }
}

impl fmt::Display for StatusFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StatusFilter::All => f.write_str("all"),
            StatusFilter::Is(status) => f.write_str(status),
        }
    }
}

/// Search, status, sort and page state of one list screen.
#[derive(Debug, Clone, PartialEq)]
pub struct FilterQuery {
    pub search_term: String,
    pub status: StatusFilter,
    pub sort_by: Option<String>,
    pub sort_order: SortOrder,
    pub page: usize,
}

impl Default for FilterQuery {
    fn default() -> Self {
        Self {
            search_term: String::new(),
            status: StatusFilter::All,
            sort_by: None,
            sort_order: SortOrder::Asc,
            page: FIRST_PAGE,
        }
    }
}

impl FilterQuery {
    /// Also resets to the first page.
    pub fn set_search_term(&mut self, term: impl Into<String>) {
        self.search_term = term.into();
        self.page = FIRST_PAGE;
    }

    /// Also resets to the first page.
    pub fn set_status_filter(&mut self, status: StatusFilter) {
        self.status = status;
        self.page = FIRST_PAGE;
    }

    pub fn set_sort(&mut self, field: impl Into<String>, order: SortOrder) {
        self.sort_by = Some(field.into());
        self.sort_order = order;
    }

    pub fn set_page(&mut self, page: usize) {
        self.page = page;
    }

    pub fn matches<R: Listable>(&self, record: &R) -> bool {
        self.status.matches(record.status_key()) && matches_search(record, &self.search_term)
    }
}

fn matches_search<R: Listable>(record: &R, term: &str) -> bool {
    if term.is_empty() {
        return true;
    }
    let needle = term.to_lowercase();
    record
        .search_fields()
        .iter()
        .any(|field| field.to_lowercase().contains(&needle))
}

#[derive(Debug, Clone, PartialEq)]
pub struct Page<T> {
    pub items: Vec<T>,
    /// 1-based, already clamped into `1..=total_pages`.
    pub page: usize,
    pub page_size: usize,
    pub total_items: usize,
    pub total_pages: usize,
}

impl<T> Page<T> {
    pub fn has_previous(&self) -> bool {
        self.page > FIRST_PAGE
    }

    pub fn has_next(&self) -> bool {
        self.page < self.total_pages
    }
}

/// Number of pages for `total_items`; never less than one so an empty list
/// still has a valid first page.
pub fn total_pages(total_items: usize, page_size: usize) -> usize {
    total_items.div_ceil(page_size.max(1)).max(1)
}

pub fn clamp_page(page: usize, total_items: usize, page_size: usize) -> usize {
    page.clamp(FIRST_PAGE, total_pages(total_items, page_size))
}

/// Records matching `query`, in their original order.
pub fn filter_records<'a, R: Listable>(records: &'a [R], query: &FilterQuery) -> Vec<&'a R> {
    records.iter().filter(|record| query.matches(*record)).collect()
}

/// Stable sort by `field`; equal keys keep their relative order.
pub fn sort_records<'a, R: Listable>(records: Vec<&'a R>, field: &str, order: SortOrder) -> Vec<&'a R> {
    let mut keyed: Vec<(SortValue, &'a R)> = records
        .into_iter()
        .map(|record| (record.sort_value(field), record))
        .collect();
    keyed.sort_by(|(a, _), (b, _)| order.apply(a.compare(b)));
    keyed.into_iter().map(|(_, record)| record).collect()
}

pub fn paginate<T>(items: Vec<T>, page: usize, page_size: usize) -> Page<T> {
    let page_size = page_size.max(1);
    let total_items = items.len();
    let total_pages = total_pages(total_items, page_size);
    let page = page.clamp(FIRST_PAGE, total_pages);
    let items = items
        .into_iter()
        .skip((page - 1) * page_size)
        .take(page_size)
        .collect();
    Page {
        items,
        page,
        page_size,
        total_items,
        total_pages,
    }
}

/// Filter, sort, then paginate.
pub fn apply_query<'a, R: Listable>(records: &'a [R], query: &FilterQuery, page_size: usize) -> Page<&'a R> {
    let mut filtered = filter_records(records, query);
    if let Some(field) = &query.sort_by {
        filtered = sort_records(filtered, field, query.sort_order);
    }
    paginate(filtered, query.page, page_size)
}

impl Listable for Task {
    fn search_fields(&self) -> Vec<&str> {
        vec![self.title.as_str(), self.description.as_str()]
    }

    fn status_key(&self) -> &str {
        self.status.as_str()
    }

    fn sort_value(&self, field: &str) -> SortValue {
        match field {
            "title" => SortValue::text(&self.title),
            "status" => SortValue::text(self.status.as_str()),
            "priority" => SortValue::Number(f64::from(self.priority.rank())),
            "assignee_id" => SortValue::optional_text(self.assignee_id.as_ref()),
            "due_date" => SortValue::optional_time(self.due_date),
            "created_at" => SortValue::Time(self.created_at),
            _ => SortValue::Missing,
        }
    }
}

impl Listable for Kra {
    fn search_fields(&self) -> Vec<&str> {
        vec![self.title.as_str(), self.description.as_str()]
    }

    fn status_key(&self) -> &str {
        self.status.as_str()
    }

    fn sort_value(&self, field: &str) -> SortValue {
        match field {
            "title" => SortValue::text(&self.title),
            "status" => SortValue::text(self.status.as_str()),
            "progress" => SortValue::Number(f64::from(self.progress)),
            "assignee_id" => SortValue::optional_text(self.assignee_id.as_ref()),
            "due_date" => SortValue::optional_time(self.due_date),
            "created_at" => SortValue::Time(self.created_at),
            _ => SortValue::Missing,
        }
    }
}

impl Listable for User {
    fn search_fields(&self) -> Vec<&str> {
        vec![self.name.as_str(), self.email.as_str()]
    }

    fn status_key(&self) -> &str {
        self.status.as_str()
    }

    fn sort_value(&self, field: &str) -> SortValue {
        match field {
            "name" => SortValue::text(&self.name),
            "email" => SortValue::text(&self.email),
            "role" => SortValue::text(self.role.as_str()),
            "status" => SortValue::text(self.status.as_str()),
            "created_at" => SortValue::Time(self.created_at),
            _ => SortValue::Missing,
        }
    }
}

impl Listable for Team {
    fn search_fields(&self) -> Vec<&str> {
        vec![self.name.as_str(), self.description.as_str()]
    }

    fn status_key(&self) -> &str {
        self.status.as_str()
    }

    fn sort_value(&self, field: &str) -> SortValue {
        match field {
            "name" => SortValue::text(&self.name),
            "status" => SortValue::text(self.status.as_str()),
            "member_count" => SortValue::Number(self.member_ids.len() as f64),
            "created_at" => SortValue::Time(self.created_at),
            _ => SortValue::Missing,
        }
    }
}

impl Listable for Ticket {
    fn search_fields(&self) -> Vec<&str> {
        vec![self.subject.as_str(), self.requester_email.as_str()]
    }

    fn status_key(&self) -> &str {
        self.status.as_str()
    }

    fn sort_value(&self, field: &str) -> SortValue {
        match field {
            "subject" => SortValue::text(&self.subject),
            "requester_email" => SortValue::text(&self.requester_email),
            "status" => SortValue::text(self.status.as_str()),
            "priority" => SortValue::Number(f64::from(self.priority.rank())),
            "assignee_id" => SortValue::optional_text(self.assignee_id.as_ref()),
            "created_at" => SortValue::Time(self.created_at),
            _ => SortValue::Missing,
        }
    }
}

impl Listable for Customer {
    fn search_fields(&self) -> Vec<&str> {
        vec![self.name.as_str(), self.email.as_str(), self.company.as_str()]
    }

    fn status_key(&self) -> &str {
        self.status.as_str()
    }

    fn sort_value(&self, field: &str) -> SortValue {
        match field {
            "name" => SortValue::text(&self.name),
            "email" => SortValue::text(&self.email),
            "company" => SortValue::text(&self.company),
            "status" => SortValue::text(self.status.as_str()),
            "created_at" => SortValue::Time(self.created_at),
            _ => SortValue::Missing,
        }
    }
}

#[cfg(test)]
#[path = "tests/listing_tests.rs"]
mod tests;
