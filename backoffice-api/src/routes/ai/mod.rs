/// AI tooling routes
///
/// - `models`: Registered language models
/// - `services`: Provider endpoints and credentials, with a connection test
/// - `prompt_templates`: Reusable prompts with `{{variable}}` placeholders
/// - `conversations`: Per-user chat history
///
/// The API stores configuration and history only. Generating replies is
/// left to clients, which post assistant messages back.

pub mod conversations;
pub mod models;
pub mod prompt_templates;
pub mod services;
