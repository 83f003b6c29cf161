fn main() -> anyhow::Result<()> {
    kylie_rs::run()
}
