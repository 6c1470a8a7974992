use std::io::{Read, Write};

use wc_consumer::container::BaseUrlGenerator;
use wc_consumer::rewriter::rewrite_wsrp_tokens;

/// Read markup from stdin, write the rewritten markup to stdout.
pub fn run(namespace: &str, base_url: &str) -> anyhow::Result<()> {
    let mut input = String::new();
    std::io::stdin().read_to_string(&mut input)?;
    let output = rewrite(&input, namespace, base_url);
    std::io::stdout().write_all(output.as_bytes())?;
    Ok(())
}

pub fn rewrite(markup: &str, namespace: &str, base_url: &str) -> String {
    rewrite_wsrp_tokens(markup, namespace, &BaseUrlGenerator::new(base_url))
}
