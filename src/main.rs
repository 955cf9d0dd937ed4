fn main() {
    if let Err(err) = ollamux::cli::main() {
        eprintln!("❌ {err}");
        std::process::exit(1);
    }
}
