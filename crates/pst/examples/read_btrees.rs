use clap::Parser;
use pst_reader::{
    ndb::{
        node_id::NodeId,
        page::{BTreeEntry, BTreePage},
        NdbResult,
    },
    *,
};
use std::iter;

mod args;

fn main() -> anyhow::Result<()> {
    args::init_tracing();
    let args = args::Args::try_parse()?;
    let pst = PstFile::read(&args.file)?;
    let database = pst.node_database();

    let block_btree = database.block_btree()?;
    output_btree(&block_btree, "Block", block_btree.level())?;
    println!();

    let node_btree = database.node_btree()?;
    output_btree(&node_btree, "Node", node_btree.level())?;
    println!();

    let keys = node_btree.all_keys()?;
    println!("Node Count: {}", keys.len());

    if let Some(node) = args.node {
        match node_btree.find_entry(NodeId::from(node).search_key())? {
            Some(BTreeEntry::Node(entry)) => println!("Found: {entry:?}"),
            Some(other) => println!("Unexpected Entry: {other:?}"),
            None => println!("Node 0x{node:X} not found"),
        }
    }

    Ok(())
}

fn output_btree(page: &BTreePage, name: &str, max_level: u8) -> NdbResult<()> {
    let indent = iter::repeat_n(' ', usize::from(max_level - page.level())).collect::<String>();
    let trailer = page.trailer();

    println!(
        "{indent}{name} BTree Level: {}: Entries: {}/{} Page: {:?} CRC: 0x{:08X}",
        page.level(),
        page.entry_count(),
        page.max_entries(),
        trailer.block_id(),
        trailer.crc()
    );

    for (index, entry) in page.entries().enumerate() {
        match entry? {
            BTreeEntry::Branch(entry) => {
                println!("{indent} Key: 0x{:X}", entry.key());
                output_btree(&page.child(index)?, name, max_level)?;
            }
            BTreeEntry::Block(entry) => {
                println!(
                    "{indent} Block: {:?} Size: 0x{:X} Ref-Count: {}",
                    entry.block(),
                    entry.size(),
                    entry.ref_count()
                );
            }
            BTreeEntry::Node(entry) => {
                println!(
                    "{indent} Node: {:?} Data: {:?} Sub-Node: {:?} Parent: {:?}",
                    entry.node(),
                    entry.data(),
                    entry.sub_node(),
                    entry.parent()
                );
            }
        }
    }

    Ok(())
}
