use eggtimer_core::Database;

pub fn run(limit: usize) -> Result<(), Box<dyn std::error::Error>> {
    let db = Database::open()?;
    let cooks = db.recent_cooks(limit)?;
    println!("{}", serde_json::to_string_pretty(&cooks)?);
    Ok(())
}
