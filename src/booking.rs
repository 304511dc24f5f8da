// Booking submission for a single travel package
// The participant bounds are a hint for the input; the service decides whether a booking is accepted.

use std::ops::RangeInclusive;
use std::sync::Arc;

use tracing::{info, warn};

use crate::api::ApiService;
use crate::error::ApiError;
use crate::models::{Booking, CreateBookingRequest, TravelPackage};
use crate::session::SessionStore;

pub const LOGIN_REQUIRED_MESSAGE: &str = "Please log in to book a package";

// Price shown before submission. Currency always comes from the package.
#[derive(Debug, Clone, PartialEq)]
pub struct BookingQuote {
    pub unit_price: f64,
    pub participants: u32,
    pub total_price: f64,
    pub currency: String,
}

impl BookingQuote {
    pub fn for_package(package: &TravelPackage, participants: u32) -> Self {
        Self {
            unit_price: package.price,
            participants,
            total_price: package.price * f64::from(participants),
            currency: package.currency.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct BookingForm {
    pub number_of_participants: u32,
    pub special_requests: String,
}

impl Default for BookingForm {
    fn default() -> Self {
        Self {
            number_of_participants: 1,
            special_requests: String::new(),
        }
    }
}

// Replaces the package with the same id; false if it isn't in the list
pub fn replace_package(packages: &mut [TravelPackage], fresh: TravelPackage) -> bool {
    match packages.iter_mut().find(|p| p.id == fresh.id) {
        Some(slot) => {
            *slot = fresh;
            true
        }
        None => false,
    }
}

pub struct BookingSubmission {
    api: Arc<ApiService>,
    session: Arc<SessionStore>,
    package: TravelPackage,
    form: BookingForm,
    open: bool,
    error: Option<String>,
}

impl BookingSubmission {
    // Opens the form for a package with default fields
    pub fn open(api: Arc<ApiService>, session: Arc<SessionStore>, package: TravelPackage) -> Self {
        Self {
            api,
            session,
            package,
            form: BookingForm::default(),
            open: true,
            error: None,
        }
    }

    pub fn package(&self) -> &TravelPackage {
        &self.package
    }

    pub fn form(&self) -> &BookingForm {
        &self.form
    }

    pub fn is_open(&self) -> bool {
        self.open
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    pub fn remaining_capacity(&self) -> u32 {
        self.package.remaining_capacity()
    }

    // Always at least one seat so the input stays usable on a full package
    pub fn participant_bounds(&self) -> RangeInclusive<u32> {
        1..=self.remaining_capacity().max(1)
    }

    pub fn set_participants(&mut self, participants: u32) {
        let bounds = self.participant_bounds();
        self.form.number_of_participants = participants.clamp(*bounds.start(), *bounds.end());
    }

    pub fn set_special_requests(&mut self, requests: impl Into<String>) {
        self.form.special_requests = requests.into();
    }

    pub fn quote(&self) -> BookingQuote {
        BookingQuote::for_package(&self.package, self.form.number_of_participants)
    }

    pub fn close(&mut self) {
        self.open = false;
        self.form = BookingForm::default();
        self.error = None;
    }

    // On success the form closes and resets; the caller should refetch the package.
    // On failure the form stays populated with the error set for a retry.
    pub async fn submit(&mut self) -> Result<Booking, ApiError> {
        self.error = None;

        let Some(user) = self.session.current_user() else {
            self.error = Some(LOGIN_REQUIRED_MESSAGE.to_string());
            return Err(ApiError::validation(LOGIN_REQUIRED_MESSAGE));
        };

        let special_requests = Some(self.form.special_requests.trim().to_string())
            .filter(|r| !r.is_empty());
        let request = CreateBookingRequest {
            user_id: user.id,
            travel_package_id: self.package.id,
            number_of_participants: self.form.number_of_participants,
            special_requests,
        };

        match self.api.create_booking(&request).await {
            Ok(booking) => {
                info!(
                    booking_id = booking.id,
                    reference = %booking.booking_reference,
                    package_id = self.package.id,
                    participants = request.number_of_participants,
                    "booking created"
                );
                self.close();
                Ok(booking)
            }
            Err(e) => {
                warn!(package_id = self.package.id, error = %e, "booking failed");
                self.error = Some(e.to_string());
                Err(e)
            }
        }
    }
}
