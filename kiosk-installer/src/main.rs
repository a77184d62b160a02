fn main() -> anyhow::Result<()> {
    kiosk_installer::run()
}
