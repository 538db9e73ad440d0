//! # Address Book Persistence
//!
//! The shared address book written through `JsonFileStore` and read back
//! the way a restarted seed does.

#[cfg(test)]
mod tests {
    use std::fs;
    use std::path::Path;
    use std::sync::Arc;

    use seed_peer_exchange::test_utils::FixedTimeSource;
    use seed_peer_exchange::{
        AddrBookStore, AddressBookConfig, BucketKind, JsonFileStore, NetAddress, NodeIdentity,
        SharedAddressBook,
    };

    fn addr(raw: &str) -> NetAddress {
        raw.parse().unwrap()
    }

    fn identity() -> NodeIdentity {
        NodeIdentity::new(addr("aa@1.1.1.1:26656"))
    }

    fn open(path: &Path) -> SharedAddressBook {
        SharedAddressBook::load(
            identity(),
            AddressBookConfig::default(),
            Arc::new(JsonFileStore::new(path)),
            Arc::new(FixedTimeSource::new(1_700_000_000)),
        )
    }

    #[tokio::test]
    async fn test_restart_restores_entries_classification_and_key() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("data/addrbook.json");

        let book = open(&path);
        assert!(book.is_empty());
        let source = addr("bb@8.8.8.8:26656");
        let good = addr("cc@9.9.9.9:26656");
        book.add_address(source.clone(), &source);
        book.add_address(good.clone(), &source);
        book.add_address(addr("dd@4.4.4.4:26656"), &source);
        assert!(book.mark_good(&good.id));
        book.save().await.unwrap();

        let reloaded = open(&path);
        assert_eq!(reloaded.size(), 3);
        assert_eq!(reloaded.snapshot(), book.snapshot());
        assert!(reloaded.get(&good.id).unwrap().is_old());
        assert_eq!(reloaded.stats().old_count, 1);
    }

    #[tokio::test]
    async fn test_file_is_plain_json_with_bucket_types() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("addrbook.json");

        let book = open(&path);
        let peer = addr("bb@8.8.8.8:26656");
        book.add_address(peer.clone(), &peer);
        book.save().await.unwrap();

        let raw = fs::read_to_string(&path).unwrap();
        assert!(raw.contains("\"bucket_type\": \"new\""));
        assert!(raw.contains("\"key\""));
        assert!(!dir.path().join("addrbook.json.tmp").exists());

        let snapshot = JsonFileStore::new(&path).load().unwrap().unwrap();
        assert_eq!(snapshot.addrs.len(), 1);
        assert_eq!(snapshot.addrs[0].bucket_type, BucketKind::New);
    }

    #[tokio::test]
    async fn test_corrupt_file_starts_empty_and_is_replaced_on_save() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("addrbook.json");
        fs::write(&path, "{ not json").unwrap();

        let book = open(&path);
        assert!(book.is_empty());

        let peer = addr("bb@8.8.8.8:26656");
        book.add_address(peer.clone(), &peer);
        book.save().await.unwrap();
        assert!(open(&path).contains(&peer.id));
    }

    #[tokio::test]
    async fn test_strict_book_drops_private_entries_on_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("addrbook.json");

        let lenient = SharedAddressBook::load(
            identity(),
            AddressBookConfig {
                strict: false,
                ..AddressBookConfig::default()
            },
            Arc::new(JsonFileStore::new(&path)),
            Arc::new(FixedTimeSource::new(1_700_000_000)),
        );
        let private = addr("bb@192.168.1.10:26656");
        let public = addr("cc@9.9.9.9:26656");
        lenient.add_address(private.clone(), &private);
        lenient.add_address(public.clone(), &public);
        lenient.save().await.unwrap();

        let strict = open(&path);
        assert!(strict.contains(&public.id));
        assert!(!strict.contains(&private.id));
    }
}
