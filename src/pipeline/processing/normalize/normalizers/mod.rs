// Entity-specific normalizer implementations
pub mod artist;
pub mod concert;
pub mod venue;

// Re-export the main components
pub use artist::ArtistNormalizer;
pub use concert::ConcertNormalizer;
pub use venue::VenueNormalizer;
