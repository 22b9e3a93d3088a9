use crate::Timestamp;

// `Timestamp` is part of most index keys. Varint encoding would break the
// byte-wise ordering, so it is always written as fixed 8 bytes, big-endian.

impl bincode::Encode for Timestamp {
    fn encode<E: bincode::enc::Encoder>(
        &self,
        encoder: &mut E,
    ) -> core::result::Result<(), bincode::error::EncodeError> {
        bincode::Encode::encode(&self.0.to_be_bytes(), encoder)?;
        Ok(())
    }
}

impl<'de, C> bincode::BorrowDecode<'de, C> for Timestamp {
    fn borrow_decode<D: bincode::de::BorrowDecoder<'de, Context = C>>(
        decoder: &mut D,
    ) -> Result<Self, bincode::error::DecodeError> {
        Ok(Self(u64::from_be_bytes(bincode::Decode::decode(decoder)?)))
    }
}

impl<C> bincode::Decode<C> for Timestamp {
    fn decode<D: bincode::de::Decoder<Context = C>>(
        decoder: &mut D,
    ) -> core::result::Result<Self, bincode::error::DecodeError> {
        Ok(Self(u64::from_be_bytes(bincode::Decode::decode(decoder)?)))
    }
}
