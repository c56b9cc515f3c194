fn main() {
    if let Err(err) = chatguard::cli::main() {
        eprintln!("❌ {err}");
        std::process::exit(1);
    }
}
