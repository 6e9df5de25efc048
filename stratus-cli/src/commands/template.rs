//! `stratus template`: print the cluster stack template.

use super::Context;
use anyhow::{Context as _, Result};
use stratus_core::tags::parse_tags;
use stratus_core::template;

pub fn template(ctx: &Context, tags: Option<&str>) -> Result<()> {
    let cluster = ctx.cluster()?;
    let tags = match tags {
        Some(input) => parse_tags(input)?,
        None => Vec::new(),
    };
    let body = template::render(&tags, &ctx.config.stack_name(cluster)).context("Failed to render template")?;
    println!("{}", body);
    Ok(())
}
