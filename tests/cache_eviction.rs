//! Cache eviction under a size cap (`SPEC_FULL.md` §8 scenario 5).

use larder::Cache;

#[test]
fn put_past_max_size_evicts_the_oldest_entry() {
    let dir = tempfile::tempdir().unwrap();
    let cache = Cache::new(dir.path().to_path_buf(), 100, None).unwrap();

    cache.put("first", &vec![0u8; 150], None).unwrap();
    assert!(cache.current_size() <= 100);

    cache.put("second", &vec![0u8; 10], None).unwrap();

    assert!(cache.current_size() <= 100);
    let stats = cache.stats();
    assert!(stats.evictions >= 1);
}
