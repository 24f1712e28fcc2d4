pub mod agent;
pub mod building;
pub mod digest;
pub mod favorite;
pub mod listing;
pub mod saved_search;
pub mod user;

pub use agent::{Agent, AgentBuilding, NewAgent};
pub use building::Building;
pub use digest::{DigestReport, DigestRun, DigestStats, EmailFailure, FailedQuery, SkippedAddress};
pub use favorite::Favorite;
pub use listing::{Listing, ListingCategory, ListingSummary, Media};
pub use saved_search::{Frequency, SavedSearch};
pub use user::User;
