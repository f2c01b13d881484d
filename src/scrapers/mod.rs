pub mod listing;
pub mod navigator;
pub mod normalize;
pub mod types;

pub use listing::{ListingExtractor, ProductCard};
pub use navigator::{CategoryNavigator, DiscoveryLimits, MenuState, Traversal};
pub use types::{ListingSelectors, ListingTimeouts, MenuSelectors, MenuTimeouts};
