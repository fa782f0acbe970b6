pub mod chat;
pub mod tools;

#[cfg(test)]
pub(crate) mod testing;
