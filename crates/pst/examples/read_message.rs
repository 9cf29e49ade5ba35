use clap::Parser;
use pst_reader::{
    messaging::mail::MailConversion,
    ndb::{node_id::NodeId, page::BTreeEntry},
    *,
};

mod args;

fn main() -> anyhow::Result<()> {
    args::init_tracing();
    let args = args::Args::try_parse()?;
    let pst = PstFile::read(&args.file)?;

    let nodes = match args.node {
        Some(node) => vec![NodeId::from(node)],
        None => message_nodes(&pst)?,
    };

    for node in nodes {
        println!("Message: {node:?}");
        let message = pst.message(node)?;

        for (name, value) in message.all_properties_with_headers() {
            println!(" {name}: {value:?}");
        }

        let Some(MailConversion {
            mail,
            failures,
            field_failures,
        }) = message.to_mail_object()?
        else {
            println!(" Not an IPM.Note");
            continue;
        };

        println!(" From: {:?}", mail.from);
        println!(" To: {:?}", mail.to);
        println!(" Cc: {:?}", mail.cc);
        println!(" Bcc: {:?}", mail.bcc);
        println!(" Subject: {:?}", mail.subject);
        println!(" Date: {:?}", mail.date);
        for header in &mail.headers {
            println!("  {}: {}", header.key, header.value);
        }
        for attachment in &mail.attachments {
            println!(
                " Attachment: {:?} ({:?}, {} bytes)",
                attachment.filename,
                attachment.content_type,
                attachment.content.len()
            );
        }
        for failure in failures {
            println!(" Skipped Attachment {}: {}", failure.index, failure.error);
        }
        for failure in field_failures {
            println!(" Dropped {}: {}", failure.field, failure.error);
        }
    }

    Ok(())
}

fn message_nodes(pst: &PstFile) -> anyhow::Result<Vec<NodeId>> {
    let node_btree = pst.node_database().node_btree()?;
    let mut nodes = Vec::new();
    for key in node_btree.all_keys()? {
        let Some(BTreeEntry::Node(entry)) = node_btree.find_entry(key)? else {
            continue;
        };
        let node = entry.node();
        if matches!(
            node.id_type(),
            Ok(ndb::node_id::NodeIdType::NormalMessage)
        ) {
            nodes.push(node);
        }
    }
    Ok(nodes)
}
