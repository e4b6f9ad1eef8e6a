use flash_ledger::{config::LedgerConfig, ledger::SqliteLedger};

pub(crate) async fn run(config: &LedgerConfig) -> Result<(), String> {
    let ledger = SqliteLedger::connect(
        &config.database_url,
        config.max_connections,
        config.busy_timeout(),
    )
    .await
    .map_err(|error| format!("failed to open ledger database: {error}"))?;

    ledger
        .migrate()
        .await
        .map_err(|error| format!("failed to migrate ledger database: {error}"))?;

    println!("ledger migrated: {}", config.database_url);

    Ok(())
}

#[cfg(test)]
mod tests {
    use flash_ledger::ledger::Ledger;
    use testresult::TestResult;

    use super::*;

    #[tokio::test]
    async fn creates_the_schema_in_a_new_database() -> TestResult {
        let dir = tempfile::tempdir()?;

        let config = LedgerConfig {
            database_url: format!("sqlite://{}", dir.path().join("ledger.db").display()),
            max_connections: 1,
            busy_timeout_ms: 1_000,
        };

        run(&config).await?;

        let ledger = SqliteLedger::connect(
            &config.database_url,
            config.max_connections,
            config.busy_timeout(),
        )
        .await?;

        assert_eq!(ledger.product_count().await?, 0);

        Ok(())
    }
}
