pub mod mem_reader;

#[cfg(test)]
pub mod testing;
