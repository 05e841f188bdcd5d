use super::{Endian, Ifd, Tag, TiffVariant};
use std::io::{self, Seek, SeekFrom, Write};

/// Streaming multi-directory TIFF writer.
///
/// Image data is appended first so tile/strip offsets are known when the
/// owning IFD is appended. Each `append_ifd` links the new directory into
/// the chain by patching the previous directory's next-IFD field.
pub struct TiffWriter<W: Write + Seek> {
    stream: W,
    pub endian: Endian,
    pub variant: TiffVariant,
    link_pos: u64,
    directories: usize,
}

impl<W: Write + Seek> TiffWriter<W> {
    pub fn new(mut stream: W, endian: Endian, variant: TiffVariant) -> io::Result<Self> {
        stream.seek(SeekFrom::Start(0))?;
        match endian {
            Endian::Little => stream.write_all(b"II")?,
            Endian::Big => stream.write_all(b"MM")?,
        }
        let link_pos = match variant {
            TiffVariant::Normal => {
                stream.write_all(&endian.encode(42u16))?;
                stream.write_all(&endian.encode(0u32))?;
                4
            }
            TiffVariant::Big => {
                stream.write_all(&endian.encode(43u16))?;
                stream.write_all(&endian.encode(8u16))?;
                stream.write_all(&endian.encode(0u16))?;
                stream.write_all(&endian.encode(0u64))?;
                8
            }
        };
        Ok(Self {
            stream,
            endian,
            variant,
            link_pos,
            directories: 0,
        })
    }

    pub fn directory_count(&self) -> usize {
        self.directories
    }

    /// Append a compressed tile or strip, returning its byte offset.
    pub fn append_data(&mut self, bytes: &[u8]) -> io::Result<u64> {
        let offset = self.align()?;
        self.stream.write_all(bytes)?;
        Ok(offset)
    }

    /// Append an IFD and link it into the directory chain.
    pub fn append_ifd(&mut self, ifd: &Ifd) -> io::Result<u64> {
        let ifd_offset = self.align()?;
        let offset_size = self.variant.offset_bytesize() as u64;
        let entry_size = self.variant.ifd_entry_size() as u64;
        let count_size: u64 = match self.variant {
            TiffVariant::Normal => 2,
            TiffVariant::Big => 8,
        };

        // Entries must be sorted by ascending tag code
        let mut tags: Vec<&Tag> = ifd.0.iter().collect();
        tags.sort_by_key(|t| t.code);

        let n = tags.len() as u64;
        let next_link_pos = ifd_offset + count_size + n * entry_size;
        let ext_start = next_link_pos + offset_size;

        // Values wider than the entry's value field go to an external
        // area directly after the IFD, word aligned.
        let mut entries: Vec<u8> = Vec::with_capacity((n * entry_size) as usize);
        let mut ext: Vec<u8> = vec![];
        for tag in tags {
            entries.extend(self.endian.encode(tag.code));
            entries.extend(self.endian.encode(u16::from(tag.datatype)));
            match self.variant {
                TiffVariant::Normal => entries.extend(self.endian.encode(tag.count as u32)),
                TiffVariant::Big => entries.extend(self.endian.encode(tag.count as u64)),
            }
            if tag.data.len() as u64 <= offset_size {
                let mut inline = tag.data.clone();
                inline.resize(offset_size as usize, 0);
                entries.extend(inline);
            } else {
                if ext.len() % 2 == 1 {
                    ext.push(0);
                }
                let data_offset = ext_start + ext.len() as u64;
                match self.variant {
                    TiffVariant::Normal => {
                        entries.extend(self.endian.encode(data_offset as u32))
                    }
                    TiffVariant::Big => entries.extend(self.endian.encode(data_offset)),
                }
                ext.extend_from_slice(&tag.data);
            }
        }

        match self.variant {
            TiffVariant::Normal => self.stream.write_all(&self.endian.encode(n as u16))?,
            TiffVariant::Big => self.stream.write_all(&self.endian.encode(n))?,
        }
        self.stream.write_all(&entries)?;
        self.write_offset(0)?; // next-IFD link, patched by the next append
        self.stream.write_all(&ext)?;

        // Link this directory in from the previous one (or the header)
        self.stream.seek(SeekFrom::Start(self.link_pos))?;
        self.write_offset(ifd_offset)?;
        self.link_pos = next_link_pos;
        self.stream.seek(SeekFrom::End(0))?;

        self.directories += 1;
        Ok(ifd_offset)
    }

    pub fn finish(mut self) -> io::Result<W> {
        self.stream.flush()?;
        Ok(self.stream)
    }

    fn align(&mut self) -> io::Result<u64> {
        let pos = self.stream.seek(SeekFrom::End(0))?;
        if pos % 2 == 1 {
            self.stream.write_all(&[0])?;
            Ok(pos + 1)
        } else {
            Ok(pos)
        }
    }

    fn write_offset(&mut self, value: u64) -> io::Result<()> {
        match self.variant {
            TiffVariant::Normal => self.stream.write_all(&self.endian.encode(value as u32)),
            TiffVariant::Big => self.stream.write_all(&self.endian.encode(value)),
        }
    }
}
