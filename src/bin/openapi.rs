use anyhow::Result;

// Prints the OpenAPI document so the storefront clients can be generated offline.
fn main() -> Result<()> {
    let doc = bpstreet::api::openapi();
    println!("{}", serde_json::to_string_pretty(&doc)?);
    Ok(())
}
