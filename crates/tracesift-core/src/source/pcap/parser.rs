use std::fs::File;
use std::path::Path;

use pcap_parser::{
    Block, LegacyPcapReader, Linktype, PcapBlockOwned, PcapError, PcapNGReader,
    traits::PcapReaderIterator,
};
use tracing::trace;

use crate::source::{CaptureTime, FrameSource, RawFrame, SourceError, SourceEvent};

use super::error::PcapSourceError;
use super::layout;
use super::reader::{
    InterfaceInfo, check_record_lengths, interface_for, is_pcapng_magic, legacy_ts_digits,
    read_magic_and_rewind,
};

/// Frame source over a legacy pcap or pcapng file.
///
/// The global header (or section header) is parsed by `open`, so an invalid
/// file is rejected before any frame is read.
pub struct PcapFileSource {
    inner: PcapReader,
    exhausted: bool,
}

struct LegacyHeader {
    linktype: Linktype,
    snaplen: u32,
    ts_digits: u8,
}

enum PcapReader {
    Legacy {
        reader: LegacyPcapReader<File>,
        header: Option<LegacyHeader>,
    },
    Ng {
        reader: PcapNGReader<File>,
        interfaces: Vec<InterfaceInfo>,
    },
}

impl PcapFileSource {
    pub fn open(path: &Path) -> Result<Self, SourceError> {
        let file = File::open(path).map_err(SourceError::from)?;
        let inner = create_reader(file).map_err(SourceError::from)?;
        Ok(Self {
            inner,
            exhausted: false,
        })
    }
}

impl FrameSource for PcapFileSource {
    fn next_event(&mut self) -> Result<Option<SourceEvent>, SourceError> {
        if self.exhausted {
            return Ok(None);
        }
        match next_event(&mut self.inner) {
            Ok(Some(event)) => Ok(Some(event)),
            Ok(None) => {
                self.exhausted = true;
                Ok(None)
            }
            Err(err) => {
                self.exhausted = true;
                Err(SourceError::from(err))
            }
        }
    }
}

fn create_reader(file: File) -> Result<PcapReader, PcapSourceError> {
    let mut file = file;
    let magic = read_magic_and_rewind(&mut file)?;

    if is_pcapng_magic(&magic) {
        let reader = PcapNGReader::new(layout::PCAP_READER_BUFFER_SIZE, file).map_err(|e| {
            PcapSourceError::Pcap {
                context: "pcapng reader init",
                message: e.to_string(),
            }
        })?;
        Ok(PcapReader::Ng {
            reader,
            interfaces: Vec::new(),
        })
    } else {
        let reader = LegacyPcapReader::new(layout::PCAP_READER_BUFFER_SIZE, file).map_err(|e| {
            PcapSourceError::Pcap {
                context: "pcap reader init",
                message: e.to_string(),
            }
        })?;
        Ok(PcapReader::Legacy {
            reader,
            header: None,
        })
    }
}

fn next_event(reader: &mut PcapReader) -> Result<Option<SourceEvent>, PcapSourceError> {
    let mut stalled_refills = 0u8;
    loop {
        match reader {
            PcapReader::Legacy { reader, header } => match reader.next() {
                Ok((offset, block)) => {
                    stalled_refills = 0;
                    let event = match block {
                        PcapBlockOwned::LegacyHeader(file_header) => {
                            *header = Some(LegacyHeader {
                                linktype: file_header.network,
                                snaplen: file_header.snaplen,
                                ts_digits: legacy_ts_digits(file_header.magic_number),
                            });
                            None
                        }
                        PcapBlockOwned::Legacy(packet) => {
                            let (linktype, snaplen, ts_digits) = header
                                .as_ref()
                                .map(|h| (h.linktype, h.snaplen, h.ts_digits))
                                .unwrap_or((Linktype::ETHERNET, 0, layout::MICROSECOND_DIGITS));
                            Some(
                                match check_record_lengths(packet.caplen, packet.origlen, snaplen) {
                                    Ok(()) => SourceEvent::Frame(RawFrame {
                                        ts: CaptureTime::from_parts(
                                            u64::from(packet.ts_sec),
                                            packet.ts_usec,
                                            ts_digits,
                                        ),
                                        linktype,
                                        data: packet.data.to_vec(),
                                    }),
                                    Err(err) => {
                                        trace!(error = %err, "damaged pcap record");
                                        SourceEvent::Damaged(err)
                                    }
                                },
                            )
                        }
                        _ => None,
                    };
                    reader.consume(offset);
                    if event.is_some() {
                        return Ok(event);
                    }
                }
                Err(PcapError::Eof) => return Ok(None),
                Err(PcapError::Incomplete(_)) => {
                    note_stalled_refill(&mut stalled_refills, "pcap reader refill")?;
                    reader.refill().map_err(|e| PcapSourceError::Truncated {
                        context: "pcap reader refill",
                        message: e.to_string(),
                    })?;
                }
                Err(e) => {
                    return Err(PcapSourceError::Truncated {
                        context: "pcap reader next",
                        message: e.to_string(),
                    });
                }
            },
            PcapReader::Ng { reader, interfaces } => match reader.next() {
                Ok((offset, block)) => {
                    stalled_refills = 0;
                    let event = match block {
                        PcapBlockOwned::NG(Block::SectionHeader(_)) => {
                            interfaces.clear();
                            None
                        }
                        PcapBlockOwned::NG(Block::InterfaceDescription(intf)) => {
                            interfaces.push(InterfaceInfo {
                                linktype: intf.linktype,
                                snaplen: intf.snaplen,
                                tsresol: intf.if_tsresol,
                                tsoffset: intf.if_tsoffset,
                            });
                            None
                        }
                        PcapBlockOwned::NG(Block::EnhancedPacket(packet)) => {
                            let intf = interface_for(interfaces, packet.if_id);
                            Some(
                                match check_record_lengths(packet.caplen, packet.origlen, intf.snaplen)
                                {
                                    Ok(()) => {
                                        let ticks = (u64::from(packet.ts_high) << 32)
                                            | u64::from(packet.ts_low);
                                        let captured =
                                            (packet.caplen as usize).min(packet.data.len());
                                        SourceEvent::Frame(RawFrame {
                                            ts: CaptureTime::from_ticks(ticks, intf.tsresol)
                                                .offset_by(intf.tsoffset),
                                            linktype: intf.linktype,
                                            data: packet.data[..captured].to_vec(),
                                        })
                                    }
                                    Err(err) => {
                                        trace!(error = %err, "damaged pcapng record");
                                        SourceEvent::Damaged(err)
                                    }
                                },
                            )
                        }
                        _ => None,
                    };
                    reader.consume(offset);
                    if event.is_some() {
                        return Ok(event);
                    }
                }
                Err(PcapError::Eof) => return Ok(None),
                Err(PcapError::Incomplete(_)) => {
                    note_stalled_refill(&mut stalled_refills, "pcapng reader refill")?;
                    reader.refill().map_err(|e| PcapSourceError::Truncated {
                        context: "pcapng reader refill",
                        message: e.to_string(),
                    })?;
                }
                Err(e) => {
                    return Err(PcapSourceError::Truncated {
                        context: "pcapng reader next",
                        message: e.to_string(),
                    });
                }
            },
        }
    }
}

/// A refill that still leaves the parser short of bytes twice in a row means
/// the file ends inside a record.
fn note_stalled_refill(stalled_refills: &mut u8, context: &'static str) -> Result<(), PcapSourceError> {
    *stalled_refills += 1;
    if *stalled_refills >= layout::MAX_STALLED_REFILLS {
        return Err(PcapSourceError::Truncated {
            context,
            message: "file ends inside a record".to_string(),
        });
    }
    Ok(())
}
