//! Generic resource commands.
//!
//! `esurat get incoming`, `esurat create outgoing --json ...`, etc.
//! Translates resource names to REST API paths.

use anyhow::Result;

use crate::config::ClientConfig;

/// Map a singular/plural resource name to the API path prefix.
fn resource_path(resource: &str) -> Result<(&'static str, &'static str)> {
    // Returns (label, api_path).
    match resource.to_lowercase().as_str() {
        // Directory
        "user" | "users" => Ok(("user", "/directory/users")),
        // Mail
        "incoming" | "incoming-mail" | "incoming-mails" => Ok(("incoming mail", "/mail/incoming")),
        "outgoing" | "outgoing-mail" | "outgoing-mails" => Ok(("outgoing mail", "/mail/outgoing")),
        "disposition" | "dispositions" => Ok(("disposition", "/mail/dispositions")),
        "classification" | "classifications" => Ok(("classification", "/mail/classifications")),
        "signatory" | "signatories" => Ok(("signatory", "/mail/signatories")),
        "stats" => Ok(("stats", "/mail/stats")),
        _ => Err(anyhow::anyhow!("Unknown resource type: {}", resource)),
    }
}

/// Table columns per list endpoint: (header, JSON key).
fn table_columns(api_path: &str) -> Option<&'static [(&'static str, &'static str)]> {
    match api_path {
        "/directory/users" => Some(&[
            ("ID", "id"),
            ("USERNAME", "username"),
            ("NAME", "name"),
            ("ROLE", "role"),
            ("PATH", "path"),
        ]),
        "/mail/incoming" => Some(&[
            ("ID", "id"),
            ("AGENDA", "agendaNumber"),
            ("DATE", "receivedDate"),
            ("SENDER", "sender"),
            ("SUBJECT", "subject"),
        ]),
        "/mail/outgoing" => Some(&[
            ("ID", "id"),
            ("NUMBER", "mailNumber"),
            ("RECIPIENT", "recipient"),
            ("SUBJECT", "subject"),
            ("UPLOADED", "uploaded"),
        ]),
        "/mail/dispositions" => Some(&[
            ("ID", "id"),
            ("STATUS", "status"),
            ("RECIPIENT", "recipientName"),
            ("SUBJECT", "mailSubject"),
        ]),
        _ => None,
    }
}

fn cell(item: &serde_json::Value, key: &str) -> String {
    match item.get(key) {
        Some(serde_json::Value::String(s)) => s.clone(),
        Some(serde_json::Value::Null) | None => "-".to_string(),
        Some(other) => other.to_string(),
    }
}

fn print_table(columns: &[(&str, &str)], items: &[serde_json::Value]) {
    let mut widths: Vec<usize> = columns.iter().map(|(h, _)| h.len()).collect();
    let rows: Vec<Vec<String>> = items
        .iter()
        .map(|item| columns.iter().map(|(_, key)| cell(item, key)).collect())
        .collect();
    for row in &rows {
        for (i, value) in row.iter().enumerate() {
            widths[i] = widths[i].max(value.len());
        }
    }

    let header: Vec<String> = columns
        .iter()
        .enumerate()
        .map(|(i, (h, _))| format!("{:w$}", h, w = widths[i]))
        .collect();
    println!("{}", header.join("  "));
    for row in &rows {
        let line: Vec<String> = row
            .iter()
            .enumerate()
            .map(|(i, v)| format!("{:w$}", v, w = widths[i]))
            .collect();
        println!("{}", line.join("  "));
    }
}

/// HTTP client helper.
fn build_client(ctx: &crate::config::Context) -> Result<(reqwest::blocking::Client, String)> {
    if ctx.server.is_empty() {
        anyhow::bail!(
            "No server URL set for context \"{}\". Run `esurat context set {} --server <url>`.",
            ctx.name,
            ctx.name
        );
    }

    let mut headers = reqwest::header::HeaderMap::new();
    if !ctx.token.is_empty() {
        let val = format!("Bearer {}", ctx.token);
        headers.insert(
            reqwest::header::AUTHORIZATION,
            reqwest::header::HeaderValue::from_str(&val)?,
        );
    }

    let client = reqwest::blocking::Client::builder()
        .default_headers(headers)
        .build()?;

    Ok((client, ctx.server.trim_end_matches('/').to_string()))
}

fn error_message(body: &serde_json::Value) -> &str {
    body["message"].as_str().unwrap_or("unknown error")
}

/// GET a resource (list or get by ID).
pub fn get(
    resource: &str,
    id: Option<&str>,
    output_json: bool,
    limit: Option<usize>,
    offset: Option<usize>,
    q: Option<&str>,
    client_config_path: &std::path::Path,
) -> Result<()> {
    let config = ClientConfig::load(client_config_path)?;
    let ctx = config
        .current()
        .ok_or_else(|| anyhow::anyhow!("No current context."))?;

    let (_, api_path) = resource_path(resource)?;
    let (client, base_url) = build_client(ctx)?;

    let url = if let Some(id) = id {
        format!("{}{}/{}", base_url, api_path, id)
    } else {
        let mut u = format!("{}{}", base_url, api_path);
        let mut params = Vec::new();
        if let Some(l) = limit {
            params.push(format!("limit={}", l));
        }
        if let Some(o) = offset {
            params.push(format!("offset={}", o));
        }
        if let Some(q) = q {
            params.push(format!("q={}", q));
        }
        if !params.is_empty() {
            u.push('?');
            u.push_str(&params.join("&"));
        }
        u
    };

    let resp = client.get(&url).send()?;
    let status = resp.status();
    let body: serde_json::Value = resp.json()?;

    if !status.is_success() {
        anyhow::bail!("Error ({}): {}", status, error_message(&body));
    }

    if output_json || id.is_some() {
        println!("{}", serde_json::to_string_pretty(&body)?);
        return Ok(());
    }

    match table_columns(api_path) {
        Some(columns) => {
            let items = body["items"].as_array().cloned().unwrap_or_default();
            print_table(columns, &items);
        }
        None => println!("{}", serde_json::to_string_pretty(&body)?),
    }
    Ok(())
}

/// CREATE a resource.
pub fn create(
    resource: &str,
    json_body: &str,
    client_config_path: &std::path::Path,
) -> Result<()> {
    let config = ClientConfig::load(client_config_path)?;
    let ctx = config
        .current()
        .ok_or_else(|| anyhow::anyhow!("No current context."))?;

    let (label, api_path) = resource_path(resource)?;
    let (client, base_url) = build_client(ctx)?;

    let url = format!("{}{}", base_url, api_path);
    let body: serde_json::Value =
        serde_json::from_str(json_body).map_err(|e| anyhow::anyhow!("Invalid JSON: {}", e))?;

    let resp = client.post(&url).json(&body).send()?;
    let status = resp.status();
    let result: serde_json::Value = resp.json()?;

    if !status.is_success() {
        anyhow::bail!("Error ({}): {}", status, error_message(&result));
    }

    println!("{} created.", label);
    println!("{}", serde_json::to_string_pretty(&result)?);
    Ok(())
}

/// UPDATE a resource (PUT with a merge patch body).
pub fn update(
    resource: &str,
    id: &str,
    json_body: &str,
    client_config_path: &std::path::Path,
) -> Result<()> {
    let config = ClientConfig::load(client_config_path)?;
    let ctx = config
        .current()
        .ok_or_else(|| anyhow::anyhow!("No current context."))?;

    let (label, api_path) = resource_path(resource)?;
    let (client, base_url) = build_client(ctx)?;

    let url = format!("{}{}/{}", base_url, api_path, id);
    let body: serde_json::Value =
        serde_json::from_str(json_body).map_err(|e| anyhow::anyhow!("Invalid JSON: {}", e))?;

    let resp = client.put(&url).json(&body).send()?;
    let status = resp.status();
    let result: serde_json::Value = resp.json()?;

    if !status.is_success() {
        anyhow::bail!("Error ({}): {}", status, error_message(&result));
    }

    println!("{} {} updated.", label, id);
    println!("{}", serde_json::to_string_pretty(&result)?);
    Ok(())
}

/// DELETE a resource.
pub fn delete(resource: &str, id: &str, client_config_path: &std::path::Path) -> Result<()> {
    let config = ClientConfig::load(client_config_path)?;
    let ctx = config
        .current()
        .ok_or_else(|| anyhow::anyhow!("No current context."))?;

    let (label, api_path) = resource_path(resource)?;
    let (client, base_url) = build_client(ctx)?;

    let url = format!("{}{}/{}", base_url, api_path, id);
    let resp = client.delete(&url).send()?;
    let status = resp.status();

    if !status.is_success() {
        let body: serde_json::Value = resp.json().unwrap_or_default();
        anyhow::bail!("Error ({}): {}", status, error_message(&body));
    }

    println!("{} {} deleted.", label, id);
    Ok(())
}

/// STATUS — check server health.
pub fn status(client_config_path: &std::path::Path) -> Result<()> {
    let config = ClientConfig::load(client_config_path)?;
    let ctx = config
        .current()
        .ok_or_else(|| anyhow::anyhow!("No current context."))?;

    println!("Context:   {}", ctx.name);
    println!(
        "Server:    {}",
        if ctx.server.is_empty() { "-" } else { &ctx.server }
    );

    if ctx.server.is_empty() {
        println!("Status:    no server configured");
        return Ok(());
    }

    let (client, base_url) = build_client(ctx)?;
    match client.get(format!("{}/health", base_url)).send() {
        Ok(resp) if resp.status().is_success() => {
            println!("Status:    ok");
            if let Ok(version) = client
                .get(format!("{}/version", base_url))
                .send()
                .and_then(|r| r.json::<serde_json::Value>())
            {
                if let Some(v) = version["version"].as_str() {
                    println!("Version:   {}", v);
                }
            }
        }
        Ok(resp) => println!("Status:    unhealthy ({})", resp.status()),
        Err(e) => println!("Status:    unreachable ({})", e),
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resource_path_aliases() {
        assert_eq!(resource_path("users").unwrap().1, "/directory/users");
        assert_eq!(resource_path("incoming").unwrap().1, "/mail/incoming");
        assert_eq!(
            resource_path("Dispositions").unwrap().1,
            "/mail/dispositions"
        );
        assert!(resource_path("widgets").is_err());
    }

    #[test]
    fn test_print_table_shapes() {
        let items = vec![
            serde_json::json!({"id": "a1", "status": "pending", "recipientName": "Belum Ditentukan"}),
            serde_json::json!({"id": "a2", "status": "process", "recipientName": null}),
        ];
        let columns = table_columns("/mail/dispositions").unwrap();
        assert_eq!(cell(&items[0], "status"), "pending");
        assert_eq!(cell(&items[1], "recipientName"), "-");
        assert_eq!(cell(&items[1], "mailSubject"), "-");
        // Smoke: printing must not panic on missing keys.
        print_table(columns, &items);
    }
}
