use anyhow::Result;
use serde_json::json;

use QuiverDump::PrefixRegistry;

pub fn exec(json: bool) -> Result<()> {
    let registry = PrefixRegistry::standard();

    if json {
        let rows: Vec<_> = registry
            .iter()
            .map(|c| {
                json!({
                    "name": c.name,
                    "prefix": c.prefix,
                    "prefix_b64": c.prefix_base64(),
                })
            })
            .collect();
        println!("{}", serde_json::to_string_pretty(&rows)?);
        return Ok(());
    }

    for c in registry.iter() {
        println!("{:<32} 0x{:02x}  {}", c.name, c.prefix, c.prefix_base64());
    }
    Ok(())
}
