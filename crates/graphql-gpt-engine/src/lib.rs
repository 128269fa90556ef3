pub mod completion;
pub mod errors;
pub mod graphql;
pub mod pipeline;
pub mod schema;
pub mod summarize;
pub mod synthesize;
pub mod token_counting;
pub mod validate;

#[cfg(test)]
mod testing;
