use crate::{
    array_type_define_public, array_type_impl_base32_str, array_type_impl_random,
    array_type_impl_serde,
};

array_type_define_public!(
    /// Identity of a user: a creator when authoring, a viewer when reading
    ///
    /// Assigned by the identity provider, the engine never mints these on its
    /// own except through [`UserId::random`] for tooling.
    struct UserId, 16
);
array_type_impl_base32_str!(UserId);
array_type_impl_serde!(struct UserId, 16);
array_type_impl_random!(UserId, 16);

array_type_define_public!(
    /// Identifier of a [`crate::Post`]
    ///
    /// Assigned by the content repository at insertion time and never reused.
    /// This is the only key used to tell posts apart, both across pages and
    /// between pages and live events.
    struct PostId, 16
);
array_type_impl_base32_str!(PostId);
array_type_impl_serde!(struct PostId, 16);
array_type_impl_random!(PostId, 16);

array_type_define_public!(
    /// Content hash of an uploaded blob
    struct BlobHash, 32
);
array_type_impl_base32_str!(BlobHash);
array_type_impl_serde!(struct BlobHash, 32);

impl From<blake3::Hash> for BlobHash {
    fn from(value: blake3::Hash) -> Self {
        Self(*value.as_bytes())
    }
}

impl BlobHash {
    pub const URL_PREFIX: &'static str = "plaza-blob:";

    pub fn of(bytes: &[u8]) -> Self {
        blake3::hash(bytes).into()
    }

    /// Public URL under which the blob is addressable
    pub fn to_url(self) -> String {
        format!("{}{self}", Self::URL_PREFIX)
    }

    pub fn from_url(url: &str) -> Option<Self> {
        url.strip_prefix(Self::URL_PREFIX)?.parse().ok()
    }
}
