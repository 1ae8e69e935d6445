//! One-shot layout classification.
//!
//! The router is consulted exactly once, when a target is created; its
//! answer is persisted as the target's immutable layout selector. A
//! routing failure fails the whole creation; there is no default layout.

use async_trait::async_trait;
use tracing::info;

use crate::backend::ChatTurn;
use crate::error::{CodegenError, CodegenResult};
use crate::layout::CodeLayout;
use crate::llm::LlmClient;

const ROUTING_SYSTEM_PROMPT: &str = "Classify the user's request into the code layout \
    that fits it best. Answer with exactly one word: html for a simple single page, \
    multi_file for a page with separate styling and scripting, vue_project for an \
    application that needs components, routing or state.";

/// Picks the code layout for a new target from its initial prompt.
#[async_trait]
pub trait LayoutRouter: Send + Sync {
    async fn classify(&self, init_prompt: &str) -> CodegenResult<CodeLayout>;
}

/// LLM-backed router.
pub struct LlmLayoutRouter {
    client: LlmClient,
}

impl LlmLayoutRouter {
    pub fn new(client: LlmClient) -> Self {
        Self { client }
    }
}

#[async_trait]
impl LayoutRouter for LlmLayoutRouter {
    async fn classify(&self, init_prompt: &str) -> CodegenResult<CodeLayout> {
        let turns = vec![
            ChatTurn::system(ROUTING_SYSTEM_PROMPT),
            ChatTurn::user(init_prompt),
        ];
        let answer = self.client.complete(&turns).await?;
        let layout = parse_routing_answer(&answer)?;
        info!(%layout, "classified generation layout");
        Ok(layout)
    }
}

/// Strict parse of the routing answer; anything but the three wire values
/// (allowing surrounding noise on a single token) is a routing failure.
fn parse_routing_answer(answer: &str) -> CodegenResult<CodeLayout> {
    let token = answer
        .trim()
        .trim_matches(|c: char| c == '`' || c == '"' || c == '.' || c == '\'')
        .to_lowercase();
    token
        .parse()
        .map_err(|_| CodegenError::Routing(format!("unexpected answer: {answer:?}")))
}

/// Router that always answers with a fixed layout. Used in tests and in
/// deployments that pin a single layout.
pub struct FixedRouter(pub CodeLayout);

#[async_trait]
impl LayoutRouter for FixedRouter {
    async fn classify(&self, _init_prompt: &str) -> CodegenResult<CodeLayout> {
        Ok(self.0)
    }
}
