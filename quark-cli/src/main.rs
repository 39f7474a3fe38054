fn main() -> anyhow::Result<()> {
    quark_cli::run()
}
