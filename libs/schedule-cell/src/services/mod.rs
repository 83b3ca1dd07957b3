pub mod availability;
pub mod template;

pub use availability::AvailabilityResolver;
pub use template::TemplateService;
