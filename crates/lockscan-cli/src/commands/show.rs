//! Handler for the `show` command.

use anyhow::Result;
use lockscan_core::api::ApiClient;

use crate::cli::ShowArgs;

pub async fn run(api: &ApiClient, args: &ShowArgs) -> Result<bool> {
    match api.package_info(&args.package, &args.tag).await {
        Ok(info) => {
            println!("{}", serde_json::to_string_pretty(&info)?);
            Ok(true)
        }
        Err(err) => {
            println!("Error: {err}");
            Ok(false)
        }
    }
}
