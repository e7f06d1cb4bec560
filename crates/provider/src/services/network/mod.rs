mod service_tags;

pub use service_tags::NetworkServiceTagsDataSource;
