// Travel booking client: typed access to the remote travel service plus the
// session, search and booking logic the views build on

pub mod api;
pub mod booking;
pub mod catalog;
pub mod config;
pub mod error;
pub mod models;
pub mod search;
pub mod sequencer;
pub mod session;
pub mod transport;

// Re-export key types for convenience
pub use api::ApiService;
pub use booking::{BookingForm, BookingQuote, BookingSubmission};
pub use catalog::FeaturedCatalog;
pub use config::ClientConfig;
pub use error::{ApiError, ClientError};
pub use models::{
    ApiResponse, Booking, BookingStatus, Destination, PackageType, PaymentStatus, Role,
    TravelPackage, User,
};
pub use search::{PriceRange, SearchController, SearchCriteria, SearchMode, SearchOutcome};
pub use session::{RegistrationForm, SessionPersistence, SessionState, SessionStore};
pub use transport::{ReqwestTransport, Transport};
