use crate::domain::booking::Booking;
use crate::domain::notification::EmailMessage;

/// Builds the lifecycle emails. Links point at the dashboard under `site_url`.
#[derive(Debug, Clone)]
pub struct NotificationTemplates {
    brand: String,
    site_url: String,
    response_window_days: i64,
}

impl NotificationTemplates {
    pub fn new(
        brand: impl Into<String>,
        site_url: impl Into<String>,
        response_window_days: i64,
    ) -> Self {
        Self {
            brand: brand.into(),
            site_url: site_url.into().trim_end_matches('/').to_string(),
            response_window_days,
        }
    }

    /// Sent to the expert once a booking is created.
    pub fn booking_requested(&self, booking: &Booking) -> EmailMessage {
        let link = format!(
            "{}/dashboard/expert/bookings?booking={}",
            self.site_url, booking.id
        );
        EmailMessage {
            email: booking.expert.email.clone(),
            subject: format!(
                "{}: {} has booked you for advice!",
                self.brand, booking.customer.name
            ),
            message: format!(
                "Hi there, {expert},\n\n\
                 {customer} has booked you for a {kind}!\n\n\
                 You can respond to the booking here:\n{link}\n\n\
                 As a reminder, the window to respond is {days} days. \
                 Feel free to contact us if you have any questions.\n\n\
                 Thanks for using {brand}!\n\n{brand} Team",
                expert = booking.expert.name,
                customer = booking.customer.name,
                kind = booking.booking_type.label().to_lowercase(),
                days = self.response_window_days,
                brand = self.brand,
            ),
        }
    }

    /// Sent to the customer once the expert's response is in and paid out.
    pub fn booking_completed(&self, booking: &Booking) -> EmailMessage {
        let link = format!(
            "{}/dashboard/adviceSeeker/bookings?booking={}",
            self.site_url, booking.id
        );
        EmailMessage {
            email: booking.customer.email.clone(),
            subject: format!(
                "{}: {} has completed your booking!",
                self.brand, booking.expert.name
            ),
            message: format!(
                "Hi there, {customer},\n\n\
                 {expert} has completed your booking!\n\n\
                 You can view the details of your booking here:\n{link}\n\n\
                 Make sure to leave a review on the expertise post, \
                 and feel free to contact us if you have any questions.\n\n\
                 Thanks for using {brand}!\n\n{brand} Team",
                customer = booking.customer.name,
                expert = booking.expert.name,
                brand = self.brand,
            ),
        }
    }
}
