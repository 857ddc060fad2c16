use ahash::RandomState;

pub type GrHashMap<K, V> = hashbrown::HashMap<K, V, RandomState>;
pub type GrHashSet<V> = hashbrown::HashSet<V, RandomState>;
