mod processor_response_repository;

pub use processor_response_repository::{
    MySqlProcessorResponseRepository, ProcessorResponseRepository,
};
