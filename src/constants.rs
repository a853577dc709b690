/// Constants used by pipeline configuration defaults.
pub mod defaults {
    /// Number of output shards when not overridden.
    pub const NUM_SHARDS: usize = 50;
    /// Days subtracted from a shard's max timestamp to derive its cutoff.
    pub const CUTOFF_WINDOW_DAYS: i64 = 2;
    /// Token id assigned to keys missing from the vocabulary.
    pub const OOV_TOKEN_ID: u32 = 4;
    /// Shard worker threads when not overridden (the reference flow is sequential).
    pub const WORKER_THREADS: usize = 1;
}

/// Domain-schema facts: folder names, token-key prefixes, entity columns.
///
/// The entity column per domain is a schema fact of the upstream dataset,
/// not a heuristic: reviews reference brands, every other domain references
/// items.
pub mod domains {
    /// Marketplace click events folder.
    pub const MARKETPLACE: &str = "marketplace";
    /// Retail purchase events folder.
    pub const RETAIL: &str = "retail";
    /// Offer interaction events folder.
    pub const OFFERS: &str = "offers";
    /// Brand review events folder.
    pub const REVIEWS: &str = "reviews";

    /// Token-key prefix for marketplace items.
    pub const PREFIX_MARKETPLACE: &str = "MP_";
    /// Token-key prefix for retail items.
    pub const PREFIX_RETAIL: &str = "RT_";
    /// Token-key prefix for offer items.
    pub const PREFIX_OFFERS: &str = "OF_";
    /// Token-key prefix for reviewed brands.
    pub const PREFIX_REVIEWS: &str = "BR_";

    /// Entity column carried by item domains.
    pub const ITEM_COLUMN: &str = "item_id";
    /// Entity column carried by the reviews domain.
    pub const BRAND_COLUMN: &str = "brand_id";
    /// Subfolder holding per-day event files (reviews keep day files at the
    /// domain root instead).
    pub const EVENTS_SUBDIR: &str = "events";
    /// File extensions accepted as event files.
    pub const EVENT_EXTENSIONS: [&str; 2] = ["pq", "parquet"];
}

/// Event-file schema columns shared by all domains.
pub mod events {
    /// User identifier column.
    pub const USER_ID_COLUMN: &str = "user_id";
    /// Event timestamp column.
    pub const TIMESTAMP_COLUMN: &str = "timestamp";
}

/// Vocabulary parquet schema columns.
pub mod vocab {
    /// Token string column in the vocabulary file.
    pub const TOKEN_STR_COLUMN: &str = "token_str";
    /// Token id column in the vocabulary file.
    pub const TOKEN_ID_COLUMN: &str = "token_id";
}

/// Shard artifact layout and schema.
pub mod shards {
    /// User identifier column in shard artifacts.
    pub const USER_ID_COLUMN: &str = "user_id";
    /// Token sequence column in shard artifacts.
    pub const SEQUENCE_COLUMN: &str = "sequence";
    /// Per-token timestamp column in shard artifacts.
    pub const TIMESTAMPS_COLUMN: &str = "timestamps";
    /// Prefix used for in-flight temporary artifacts before publish.
    pub const TMP_PREFIX: &str = ".shard_";

    /// Artifact file name for one shard.
    pub fn file_name(shard_id: usize) -> String {
        format!("shard_{shard_id}.parquet")
    }
}

/// Constants of the stable user hash; part of the on-disk contract.
pub mod hashing {
    /// FNV-1a 64-bit offset basis.
    pub const FNV1A64_OFFSET: u64 = 0xcbf29ce484222325;
    /// FNV-1a 64-bit prime.
    pub const FNV1A64_PRIME: u64 = 0x100000001b3;
}

/// Remote dataset layout served by the fetcher.
#[cfg(feature = "huggingface")]
pub mod fetch {
    /// Hugging Face dataset repository id.
    pub const DATASET_REPO: &str = "t-tech/T-ECD";
    /// Default path prefix within the dataset repository.
    pub const DATASET_PATH: &str = "dataset/full";
    /// Default local directory for the materialized dataset.
    pub const LOCAL_DIR: &str = "t_ecd_full";
    /// Static files downloaded regardless of the day range.
    pub const STATIC_FILES: [&str; 2] = ["users.pq", "brands.pq"];
    /// Domains that ship an `items.pq` catalog file.
    pub const ITEM_DOMAINS: [&str; 3] = ["retail", "marketplace", "offers"];
    /// All domains known to the remote dataset.
    pub const ALL_DOMAINS: [&str; 5] = ["retail", "marketplace", "offers", "reviews", "payments"];
    /// Per-domain item catalog file name.
    pub const ITEMS_FILE: &str = "items.pq";
    /// Domain that ships a second day-file stream of receipts.
    pub const PAYMENTS_DOMAIN: &str = "payments";
    /// Subfolder with payment receipt day files.
    pub const RECEIPTS_SUBDIR: &str = "receipts";
    /// Zero-padded width of day file names (`00042.pq`).
    pub const DAY_PAD_WIDTH: usize = 5;
    /// Last day index shipped by the dataset (inclusive).
    pub const LAST_DAY: u32 = 1308;
    /// Default parallel download workers.
    pub const MAX_WORKERS: usize = 20;
}
