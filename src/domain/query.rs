use crate::domain::booking::{Booking, BookingStatus, BookingType};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Serialize;

/// Search and filter criteria for listing bookings. Every field is optional;
/// an empty filter matches everything.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BookingFilter {
    /// Case-insensitive substring over submission, response, post title and
    /// both party names.
    pub keyword: Option<String>,
    pub status: Option<BookingStatus>,
    pub booking_type: Option<BookingType>,
    pub expert_id: Option<String>,
    pub customer_id: Option<String>,
    pub expertise_post_id: Option<String>,
    pub created_after: Option<DateTime<Utc>>,
    pub created_before: Option<DateTime<Utc>>,
    pub min_total: Option<Decimal>,
    pub max_total: Option<Decimal>,
    /// Matches bookings whose response window closed at or before this instant.
    pub deadline_before: Option<DateTime<Utc>>,
}

impl BookingFilter {
    pub fn matches(&self, booking: &Booking) -> bool {
        if let Some(keyword) = self.keyword.as_deref().map(str::trim)
            && !keyword.is_empty()
            && !Self::searchable_fields(booking)
                .any(|field| field.to_lowercase().contains(&keyword.to_lowercase()))
        {
            return false;
        }

        self.status.is_none_or(|s| booking.status == s)
            && self.booking_type.is_none_or(|t| booking.booking_type == t)
            && self.expert_id.as_deref().is_none_or(|id| booking.expert.id == id)
            && self.customer_id.as_deref().is_none_or(|id| booking.customer.id == id)
            && self
                .expertise_post_id
                .as_deref()
                .is_none_or(|id| booking.expertise_post.id == id)
            && self.created_after.is_none_or(|t| booking.created_at >= t)
            && self.created_before.is_none_or(|t| booking.created_at <= t)
            && self.min_total.is_none_or(|m| booking.total.value() >= m)
            && self.max_total.is_none_or(|m| booking.total.value() <= m)
            && self.deadline_before.is_none_or(|t| booking.response_deadline <= t)
    }

    fn searchable_fields(booking: &Booking) -> impl Iterator<Item = &str> {
        [
            Some(booking.single_text_response.customer_submission.as_str()),
            booking.single_text_response.expert_response.as_deref(),
            Some(booking.expertise_post.title.as_str()),
            Some(booking.expert.name.as_str()),
            Some(booking.customer.name.as_str()),
        ]
        .into_iter()
        .flatten()
    }
}

/// 1-indexed page request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pagination {
    pub page: u32,
    pub per_page: u32,
}

impl Pagination {
    pub fn new(page: u32, per_page: u32) -> Self {
        Self {
            page: page.max(1),
            per_page: per_page.max(1),
        }
    }

    /// A single page large enough to hold every match.
    pub fn unbounded() -> Self {
        Self {
            page: 1,
            per_page: u32::MAX,
        }
    }

    pub fn offset(&self) -> usize {
        (self.page as usize - 1).saturating_mul(self.per_page as usize)
    }

    pub fn limit(&self) -> usize {
        self.per_page as usize
    }

    /// Applies search, filter, newest-first ordering and paging to a full scan.
    pub fn paginate(self, filter: &BookingFilter, all: Vec<Booking>) -> BookingPage {
        let total_count = all.len();
        let mut matching: Vec<Booking> = all.into_iter().filter(|b| filter.matches(b)).collect();
        matching.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));

        let filtered_count = matching.len();
        let items = matching
            .into_iter()
            .skip(self.offset())
            .take(self.limit())
            .collect();

        BookingPage {
            items,
            total_count,
            filtered_count,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BookingPage {
    pub items: Vec<Booking>,
    /// Bookings in the store, before any filtering.
    pub total_count: usize,
    /// Bookings matching the filter, before paging.
    pub filtered_count: usize,
}
