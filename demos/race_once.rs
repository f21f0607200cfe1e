// Run a short race and print the resulting chain

use block_race::{MiningConfig, MiningPool, StopLimits};

fn main() {
    env_logger::init();

    println!("Racing 4 miners for 3 blocks at difficulty 12...\n");

    let mut config = MiningConfig::new(12);
    config.limits = StopLimits { blocks: Some(3), submissions: None };

    let pool = match MiningPool::new(config) {
        Ok(pool) => pool,
        Err(e) => {
            eprintln!("Error: {}", e);
            std::process::exit(1);
        }
    };

    match pool.run() {
        Ok(report) => {
            for block in report.chain.iter() {
                println!("#{} mined by {}: hash 0x{:08x}", block.height, block.mined_by, block.hash);
            }
            println!(
                "\n{} submissions, {} rejected",
                report.tally.submissions,
                report.tally.rejected()
            );
        }
        Err(e) => {
            eprintln!("✗ Race failed: {}", e);
            std::process::exit(1);
        }
    }
}
