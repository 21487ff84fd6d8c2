pub mod registry;
pub mod router;

pub use registry::EndpointRegistry;
pub use router::AdaptiveRouter;
