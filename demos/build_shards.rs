use std::error::Error;

fn main() -> Result<(), Box<dyn Error>> {
    seqshard::example_apps::run_build_shards(std::env::args().skip(1))
}
