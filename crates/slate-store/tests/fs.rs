use bson::{doc, Bson};
use slate_store::{FsStore, RealFilesystemDriver, StorageAdapter};

#[test]
fn sharded_store_round_trips_through_real_disk() {
    let dir = tempfile::tempdir().unwrap();
    let mut store = FsStore::new(RealFilesystemDriver::new(dir.path()));
    store.setup().unwrap();

    store
        .insert(&[
            doc! {"id": 1, "name": "a"},
            doc! {"id": 2, "name": "b"},
            doc! {"id": 3, "name": "c"},
        ])
        .unwrap();
    assert_eq!(store.read_all().unwrap().len(), 3);

    store.teardown().unwrap();

    // Reopen against the same directory and confirm the data survived.
    let mut reopened = FsStore::new(RealFilesystemDriver::new(dir.path()));
    reopened.setup().unwrap();
    assert_eq!(reopened.read_all().unwrap().len(), 3);

    reopened.remove(&[Bson::Int32(2)]).unwrap();
    assert_eq!(reopened.read_all().unwrap().len(), 2);
}

#[test]
fn index_survives_reopen() {
    let dir = tempfile::tempdir().unwrap();
    let mut store = FsStore::new(RealFilesystemDriver::new(dir.path()));
    store.setup().unwrap();
    store.create_index("type").unwrap();
    store.insert(&[doc! {"id": 1, "type": "kitten"}]).unwrap();
    store.teardown().unwrap();

    let mut reopened = FsStore::new(RealFilesystemDriver::new(dir.path()));
    reopened.setup().unwrap();
    let index = reopened.read_index("type").unwrap();
    assert_eq!(index.get("s:kitten").unwrap(), &vec![Bson::Int32(1)]);
}
