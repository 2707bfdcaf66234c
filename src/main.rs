fn main() {
    if let Err(err) = roster_sql::run() {
        eprintln!("error: {err:#}");
        std::process::exit(1);
    }
}
