//! # Loopback TCP
//!
//! Two complete seed runtimes: the second bootstraps from the first over
//! real sockets.

#[cfg(test)]
mod tests {
    use std::path::Path;
    use std::time::Duration;

    use seed_node::{SeedConfig, SeedRuntime};

    fn loopback_config(seeds: String) -> SeedConfig {
        let mut config = SeedConfig::default();
        config.laddr = "tcp://127.0.0.1:0".into();
        config.chain_id = "loopback-1".into();
        config.addr_book_strict = false;
        config.seeds = seeds;
        config
    }

    async fn boot(config: SeedConfig, home: &Path) -> SeedRuntime {
        let runtime = SeedRuntime::bootstrap(config, home).await.unwrap();
        runtime.start();
        runtime
    }

    async fn eventually(what: &str, check: impl Fn() -> bool) {
        let waited = tokio::time::timeout(Duration::from_secs(20), async {
            while !check() {
                tokio::time::sleep(Duration::from_millis(50)).await;
            }
        })
        .await;
        assert!(waited.is_ok(), "timed out waiting until {what}");
    }

    #[tokio::test]
    async fn test_second_seed_bootstraps_from_first() {
        let home_a = tempfile::tempdir().unwrap();
        let home_b = tempfile::tempdir().unwrap();

        let first = boot(loopback_config(String::new()), home_a.path()).await;
        let first_id = first.switch().identity().id().clone();
        let seeds = format!("{first_id}@{}", first.local_addr());

        let second = boot(loopback_config(seeds), home_b.path()).await;
        let second_id = second.switch().identity().id().clone();

        eventually("the first seed learned the second", || {
            first.switch().address_book().contains(&second_id)
        })
        .await;
        eventually("the second seed marked the first good", || {
            second
                .switch()
                .address_book()
                .get(&first_id)
                .is_some_and(|e| e.is_old())
        })
        .await;

        let learned = first.switch().address_book().get(&second_id).unwrap();
        assert_eq!(learned.addr.socket_addr(), second.local_addr());

        second.switch().shutdown().await;
        first.switch().shutdown().await;
        assert!(home_a.path().join("data/addrbook.json").exists());
        assert!(home_b.path().join("data/addrbook.json").exists());
    }

    #[tokio::test]
    async fn test_mismatched_chain_never_connects() {
        let home_a = tempfile::tempdir().unwrap();
        let home_b = tempfile::tempdir().unwrap();

        let first = boot(loopback_config(String::new()), home_a.path()).await;
        let first_id = first.switch().identity().id().clone();
        let seeds = format!("{first_id}@{}", first.local_addr());

        let mut config = loopback_config(seeds);
        config.chain_id = "other-1".into();
        let second = boot(config, home_b.path()).await;

        eventually("the dial failed and is backing off", || {
            second.switch().retry_delay(&first_id).is_some()
        })
        .await;
        assert!(first.switch().address_book().is_empty());
        assert!(second.switch().address_book().is_empty());
        assert!(first.switch().connected_peers().is_empty());

        second.switch().shutdown().await;
        first.switch().shutdown().await;
    }
}
