use log::info;

use bufpooldb::global;
use bufpooldb::PageType;

fn main() -> bufpooldb::Result<()> {
    global::init_from_settings()?;
    info!("buffer pool initialized");

    let table_id = global::open_table("./data/demo.db")?;
    let handle = global::get_new_block(table_id, PageType::Default)?;
    global::write_field(&handle, 1u64, 0)?;
    drop(handle);

    global::shutdown()?;
    info!("buffer pool shut down cleanly");
    Ok(())
}
