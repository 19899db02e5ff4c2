#![forbid(unsafe_code)]

fn main() {
    if let Err(error) = tmux2html::run_from_env() {
        eprintln!("tmux2html: {error}");
        std::process::exit(error.exit_code());
    }
}
