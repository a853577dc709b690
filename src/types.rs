/// Normalized user identifier (integer-keyed sources use the decimal rendering).
/// Examples: `u1`, `884213`
pub type UserId = String;
/// Domain-prefixed entity key resolved against the vocabulary.
/// Examples: `MP_1043`, `RT_5`, `BR_77`
pub type TokenKey = String;
/// Integer surrogate for a token key.
/// Example: `543`
pub type TokenId = u32;
/// Shard ordinal in `[0, num_shards)`.
pub type ShardId = usize;
/// Domain folder name under the raw dataset root.
/// Examples: `marketplace`, `reviews`
pub type DomainName = String;
/// Token-key prefix distinguishing domains that share an entity id space.
/// Examples: `MP_`, `BR_`
pub type DomainPrefix = String;
/// Event instant as milliseconds since the Unix epoch.
/// Example: `1697049600000`
pub type EpochMillis = i64;
