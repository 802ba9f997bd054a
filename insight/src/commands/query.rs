//! Ask one question about a repository.

use anyhow::Result;

use crate::context::Context;

pub async fn execute(repository: &str, question: &str, ctx: &Context) -> Result<()> {
    let repo = ctx.repository(repository)?;
    let answer = ctx.orchestrator.ask(&repo, question, &ctx.credentials).await?;
    println!("{}", answer);
    Ok(())
}
