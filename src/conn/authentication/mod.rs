mod crypto_util;
mod scram_sha1;

pub(crate) use scram_sha1::authenticate;
